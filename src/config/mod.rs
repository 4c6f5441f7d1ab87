pub mod cli;
pub mod credentials;
pub mod toml_config;

use crate::config::credentials::{CredentialSource, CredentialsConfig};
use crate::core::ConfigProvider;
use crate::domain::period::Period;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_url, Validate,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://appeears.earthdatacloud.nasa.gov/api/";
/// ECOSTRESS L3 tiled evapotranspiration, JET ensemble.
pub const DEFAULT_PRODUCT: &str = "ECO_L3T_JET.002";
pub const DEFAULT_LAYER: &str = "ETdaily";

#[derive(Debug, Clone, Parser)]
#[command(name = "ecostress-monthly")]
#[command(about = "Download one month of ECOSTRESS data through the AppEEARS API")]
#[command(after_help = "Environment:\n  EARTHDATA_USER  NASA Earthdata username\n  \
EARTHDATA_PASS  NASA Earthdata password\n\nRerunning with the same --outdir resumes the task \
recorded in its manifest.json.")]
pub struct CliConfig {
    #[arg(long, default_value_t = 2023)]
    pub year: i32,

    /// Month (1-12)
    #[arg(long)]
    pub month: u32,

    /// GeoJSON area of interest
    #[arg(long)]
    pub aoi: PathBuf,

    /// Base output directory; files land in <outdir>/year=YYYY/month=MM
    #[arg(long)]
    pub outdir: PathBuf,

    /// Polling interval in seconds
    #[arg(long, default_value_t = 60)]
    pub poll: u64,

    /// Give up polling after this many seconds (default: wait indefinitely)
    #[arg(long)]
    pub max_wait: Option<u64>,

    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, default_value = DEFAULT_PRODUCT)]
    pub product: String,

    #[arg(long, default_value = DEFAULT_LAYER)]
    pub layer: String,

    /// Where Earthdata credentials come from
    #[arg(long, value_enum, default_value_t = CredentialSource::Auto)]
    pub credentials: CredentialSource,

    /// netrc file to read (default: $NETRC or ~/.netrc)
    #[arg(long)]
    pub netrc: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub log_json: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

impl CliConfig {
    pub fn credentials_config(&self) -> CredentialsConfig {
        CredentialsConfig {
            source: self.credentials,
            netrc_path: self.netrc.clone(),
        }
    }
}

impl ConfigProvider for CliConfig {
    fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }

    fn aoi_path(&self) -> &Path {
        &self.aoi
    }

    fn product(&self) -> &str {
        &self.product
    }

    fn layer(&self) -> &str {
        &self.layer
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll)
    }

    fn max_wait(&self) -> Option<Duration> {
        self.max_wait.map(Duration::from_secs)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        Period::new(self.year, self.month)?;
        validate_path("aoi", &self.aoi.to_string_lossy())?;
        validate_path("outdir", &self.outdir.to_string_lossy())?;
        validate_positive_number("poll", self.poll, 1)?;
        if let Some(max_wait) = self.max_wait {
            validate_positive_number("max_wait", max_wait, 1)?;
        }
        validate_url("api_url", &self.api_url)?;
        validate_non_empty_string("product", &self.product)?;
        validate_non_empty_string("layer", &self.layer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_download() {
        let config = CliConfig::parse_from([
            "ecostress-monthly",
            "--month",
            "7",
            "--aoi",
            "data/aoi/iowa.geojson",
            "--outdir",
            "data/raw/ECOSTRESS",
        ]);

        assert_eq!(config.year, 2023);
        assert_eq!(config.poll, 60);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.product, "ECO_L3T_JET.002");
        assert_eq!(config.layer, "ETdaily");
        assert_eq!(config.credentials, CredentialSource::Auto);
        assert_eq!(config.period(), Period { year: 2023, month: 7 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_month_is_required() {
        let parsed = CliConfig::try_parse_from([
            "ecostress-monthly",
            "--aoi",
            "a.geojson",
            "--outdir",
            "out",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_month_out_of_range_fails_validation() {
        let config = CliConfig::parse_from([
            "ecostress-monthly",
            "--month",
            "13",
            "--aoi",
            "a.geojson",
            "--outdir",
            "out",
        ]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = CliConfig::parse_from([
            "ecostress-monthly",
            "--month",
            "1",
            "--aoi",
            "a.geojson",
            "--outdir",
            "out",
            "--poll",
            "0",
        ]);
        assert!(config.validate().is_err());
    }
}

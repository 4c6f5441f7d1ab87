use crate::config::credentials::{CredentialSource, CredentialsConfig, PASS_VAR};
use crate::config::{DEFAULT_API_URL, DEFAULT_LAYER, DEFAULT_PRODUCT};
use crate::core::ConfigProvider;
use crate::domain::period::{Period, PeriodWindow};
use crate::utils::error::{BatchError, Result};
use crate::utils::validation::{
    validate_memory, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_required_field, validate_url, validate_walltime, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// The downloader binary built by this crate.
pub const DEFAULT_PROGRAM: &str = "ecostress-monthly";

/// Everything one array job needs: the period window, filesystem layout,
/// AppEEARS settings, the downloader to launch and the scheduler directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub project: ProjectConfig,
    pub window: WindowConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub appeears: AppeearsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start_year: i32,
    pub years: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub aoi: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppeearsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_layer")]
    pub layer: String,
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    pub max_wait_seconds: Option<u64>,
}

impl Default for AppeearsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            product: default_product(),
            layer: default_layer(),
            poll_seconds: default_poll_seconds(),
            max_wait_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Executable invoked once per array task.
    #[serde(default = "default_program")]
    pub program: String,
    /// Placed before the derived `--year/--month/--aoi/--outdir` flags, so a
    /// script path can follow an interpreter (`program = "python"`).
    #[serde(default)]
    pub args: Vec<String>,
    /// Added to the inherited environment, e.g. `PYTHONPATH`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Pass the `[appeears]` and `[credentials]` settings as flags. Unset
    /// means on for `ecostress-monthly` and off for anything else.
    pub forward_settings: Option<bool>,
}

impl DownloaderConfig {
    pub fn forwards_settings(&self) -> bool {
        self.forward_settings.unwrap_or_else(|| {
            Path::new(&self.program)
                .file_name()
                .is_some_and(|name| name == DEFAULT_PROGRAM)
        })
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            env: BTreeMap::new(),
            forward_settings: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_job_name")]
    pub job_name: String,
    #[serde(default = "default_walltime")]
    pub time: String,
    #[serde(default = "default_mem")]
    pub mem: String,
    #[serde(default = "default_cpus")]
    pub cpus: u32,
    pub partition: Option<String>,
    pub account: Option<String>,
    /// Environment modules to load before running.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Extra shell lines, e.g. activating a virtualenv.
    #[serde(default)]
    pub setup: Vec<String>,
    /// Command that runs a single array task.
    #[serde(default = "default_array_task_bin")]
    pub array_task_bin: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            job_name: default_job_name(),
            time: default_walltime(),
            mem: default_mem(),
            cpus: default_cpus(),
            partition: None,
            account: None,
            modules: Vec::new(),
            setup: Vec::new(),
            array_task_bin: default_array_task_bin(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_product() -> String {
    DEFAULT_PRODUCT.to_string()
}
fn default_layer() -> String {
    DEFAULT_LAYER.to_string()
}
fn default_poll_seconds() -> u64 {
    60
}
fn default_program() -> String {
    DEFAULT_PROGRAM.to_string()
}
fn default_job_name() -> String {
    "ecostress".to_string()
}
fn default_walltime() -> String {
    "04:00:00".to_string()
}
fn default_mem() -> String {
    "8G".to_string()
}
fn default_cpus() -> u32 {
    1
}
fn default_array_task_bin() -> String {
    "array-task".to_string()
}

impl BatchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BatchError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);
        let config = toml::from_str(&processed_content)?;
        Ok(config)
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left
    /// in place so path validation can name them.
    fn substitute_env_vars(content: &str) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn window(&self) -> Result<PeriodWindow> {
        PeriodWindow::new(self.window.start_year, self.window.years)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("project.name", &self.project.name)?;

        validate_positive_number("window.years", self.window.years as u64, 1)?;
        self.window()?;

        if let Some(aoi) = &self.paths.aoi {
            validate_path("paths.aoi", &aoi.to_string_lossy())?;
        }
        if let Some(outdir) = &self.paths.outdir {
            validate_path("paths.outdir", &outdir.to_string_lossy())?;
        }
        let log_dir = self.paths.log_dir.to_string_lossy();
        validate_path("paths.log_dir", &log_dir)?;
        if log_dir.chars().any(char::is_whitespace) {
            return Err(BatchError::InvalidConfigValueError {
                field: "paths.log_dir".to_string(),
                value: log_dir.into_owned(),
                reason: "#SBATCH --output/--error paths cannot contain whitespace".to_string(),
            });
        }

        validate_url("appeears.api_url", &self.appeears.api_url)?;
        validate_non_empty_string("appeears.product", &self.appeears.product)?;
        validate_non_empty_string("appeears.layer", &self.appeears.layer)?;
        validate_positive_number("appeears.poll_seconds", self.appeears.poll_seconds, 1)?;

        validate_non_empty_string("downloader.program", &self.downloader.program)?;
        if self.downloader.env.contains_key(PASS_VAR) {
            return Err(BatchError::InvalidConfigValueError {
                field: format!("downloader.env.{}", PASS_VAR),
                value: "<redacted>".to_string(),
                reason: "Plaintext passwords are not accepted in the batch file; export it in \
                         the submitting shell or use a netrc file"
                    .to_string(),
            });
        }
        if let Some(netrc) = &self.credentials.netrc_path {
            if self.credentials.source == CredentialSource::Env {
                tracing::warn!(
                    "credentials.netrc_path {} is ignored with source = \"env\"",
                    netrc.display()
                );
            }
        }

        validate_non_empty_string("scheduler.job_name", &self.scheduler.job_name)?;
        if self.scheduler.job_name.chars().any(char::is_whitespace) {
            return Err(BatchError::InvalidConfigValueError {
                field: "scheduler.job_name".to_string(),
                value: self.scheduler.job_name.clone(),
                reason: "Job names are used unquoted in #SBATCH directives".to_string(),
            });
        }
        validate_walltime("scheduler.time", &self.scheduler.time)?;
        validate_memory("scheduler.mem", &self.scheduler.mem)?;
        validate_range("scheduler.cpus", self.scheduler.cpus, 1, 256)?;
        validate_non_empty_string("scheduler.array_task_bin", &self.scheduler.array_task_bin)?;

        Ok(())
    }
}

impl Validate for BatchConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// The settings for downloading one month in-process, taken from the
/// `[paths]` and `[appeears]` sections.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub period: Period,
    pub aoi: PathBuf,
    pub outdir: PathBuf,
    pub appeears: AppeearsConfig,
}

impl BatchConfig {
    pub fn task_config(&self, period: Period) -> Result<TaskConfig> {
        let aoi = validate_required_field("paths.aoi", &self.paths.aoi)?;
        let outdir = validate_required_field("paths.outdir", &self.paths.outdir)?;
        Ok(TaskConfig {
            period,
            aoi: aoi.clone(),
            outdir: outdir.clone(),
            appeears: self.appeears.clone(),
        })
    }
}

impl ConfigProvider for TaskConfig {
    fn period(&self) -> Period {
        self.period
    }

    fn aoi_path(&self) -> &Path {
        &self.aoi
    }

    fn product(&self) -> &str {
        &self.appeears.product
    }

    fn layer(&self) -> &str {
        &self.appeears.layer
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.appeears.poll_seconds)
    }

    fn max_wait(&self) -> Option<Duration> {
        self.appeears.max_wait_seconds.map(Duration::from_secs)
    }
}

use crate::config::credentials::{CredentialSource, CredentialsConfig};
use crate::config::toml_config::{AppeearsConfig, BatchConfig, DownloaderConfig, PathsConfig};
use crate::domain::period::Period;
use crate::utils::error::{BatchError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// The downloader invocation for one array task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl LaunchPlan {
    /// `program [args...] --year Y --month M [--aoi A] [--outdir O]`
    pub fn for_period(
        downloader: &DownloaderConfig,
        period: Period,
        aoi: Option<&Path>,
        outdir: Option<&Path>,
    ) -> Self {
        let mut args = downloader.args.clone();
        args.extend([
            "--year".to_string(),
            period.year.to_string(),
            "--month".to_string(),
            period.month.to_string(),
        ]);
        if let Some(aoi) = aoi {
            args.extend(["--aoi".to_string(), aoi.display().to_string()]);
        }
        if let Some(outdir) = outdir {
            args.extend(["--outdir".to_string(), outdir.display().to_string()]);
        }

        Self {
            program: downloader.program.clone(),
            args,
            env: downloader.env.clone(),
        }
    }

    /// The plan an array task runs: the derived period and paths, plus the
    /// `[appeears]`/`[credentials]` flags when the downloader takes them.
    /// A configured netrc file is exported as `NETRC` either way.
    pub fn for_task(config: &BatchConfig, period: Period) -> Self {
        let mut plan = Self::for_period(
            &config.downloader,
            period,
            config.paths.aoi.as_deref(),
            config.paths.outdir.as_deref(),
        );
        if config.downloader.forwards_settings() {
            plan.forward_settings(&config.appeears, &config.credentials);
        }
        if let Some(netrc) = &config.credentials.netrc_path {
            if config.credentials.source != CredentialSource::Env {
                plan.env
                    .entry("NETRC".to_string())
                    .or_insert_with(|| netrc.display().to_string());
            }
        }
        plan
    }

    fn forward_settings(&mut self, appeears: &AppeearsConfig, credentials: &CredentialsConfig) {
        self.args.extend([
            "--api-url".to_string(),
            appeears.api_url.clone(),
            "--product".to_string(),
            appeears.product.clone(),
            "--layer".to_string(),
            appeears.layer.clone(),
            "--poll".to_string(),
            appeears.poll_seconds.to_string(),
        ]);
        if let Some(max_wait) = appeears.max_wait_seconds {
            self.args
                .extend(["--max-wait".to_string(), max_wait.to_string()]);
        }
        self.args.extend([
            "--credentials".to_string(),
            credentials.source.as_str().to_string(),
        ]);
        if let Some(netrc) = &credentials.netrc_path {
            self.args
                .extend(["--netrc".to_string(), netrc.display().to_string()]);
        }
    }

    /// Shell-quoted rendering for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the downloader to completion. Its stdout/stderr go straight to
    /// the scheduler's log files.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("▶️ Launching: {}", self.command_line());
        for key in self.env.keys() {
            tracing::debug!("Setting {} for child process", key);
        }

        let status = Command::new(&self.program)
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| BatchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            tracing::info!("✅ {} finished", self.program);
            Ok(())
        } else {
            tracing::error!("❌ {} exited with {}", self.program, status);
            Err(BatchError::ChildProcess {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Creates the log directory and, when configured, the output directory.
pub async fn prepare_directories(paths: &PathsConfig) -> Result<()> {
    tokio::fs::create_dir_all(&paths.log_dir).await?;
    if let Some(outdir) = &paths.outdir {
        tokio::fs::create_dir_all(outdir).await?;
    }
    Ok(())
}

pub(crate) fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(program: &str, args: &[&str]) -> DownloaderConfig {
        DownloaderConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            forward_settings: None,
        }
    }

    #[test]
    fn test_plan_arguments() {
        let plan = LaunchPlan::for_period(
            &downloader("python", &["scripts/ecostress_monthly.py"]),
            Period::new(2021, 1).unwrap(),
            Some(Path::new("data/aoi/iowa.geojson")),
            Some(Path::new("data/raw/ECOSTRESS")),
        );

        assert_eq!(plan.program, "python");
        assert_eq!(
            plan.args,
            vec![
                "scripts/ecostress_monthly.py",
                "--year",
                "2021",
                "--month",
                "1",
                "--aoi",
                "data/aoi/iowa.geojson",
                "--outdir",
                "data/raw/ECOSTRESS",
            ]
        );
    }

    #[test]
    fn test_plan_omits_unconfigured_paths() {
        let plan = LaunchPlan::for_period(
            &downloader("ecostress-monthly", &[]),
            Period::new(2019, 12).unwrap(),
            None,
            None,
        );
        assert_eq!(plan.args, vec!["--year", "2019", "--month", "12"]);
    }

    #[test]
    fn test_command_line_quoting() {
        let plan = LaunchPlan::for_period(
            &downloader("python", &[]),
            Period::new(2020, 6).unwrap(),
            Some(Path::new("/data/my aoi's.geojson")),
            None,
        );
        assert_eq!(
            plan.command_line(),
            r"python --year 2020 --month 6 --aoi '/data/my aoi'\''s.geojson'"
        );
    }

    fn batch(extra: &str) -> BatchConfig {
        let content = format!(
            r#"
[project]
name = "p"

[window]
start_year = 2019
years = 5

[paths]
aoi = "/p/aoi.geojson"
outdir = "/p/out"
log_dir = "/p/logs"

{}
"#,
            extra
        );
        BatchConfig::from_toml_str(&content).unwrap()
    }

    #[test]
    fn test_own_downloader_receives_appeears_and_credential_flags() {
        let config = batch(
            r#"
[appeears]
product = "ECO_L2T_LSTE.002"
layer = "LST"
poll_seconds = 300
max_wait_seconds = 7200

[credentials]
source = "netrc"
netrc_path = "/p/.netrc"
"#,
        );
        let plan = LaunchPlan::for_task(&config, Period::new(2021, 1).unwrap());

        assert_eq!(plan.program, "ecostress-monthly");
        assert_eq!(
            plan.args,
            vec![
                "--year",
                "2021",
                "--month",
                "1",
                "--aoi",
                "/p/aoi.geojson",
                "--outdir",
                "/p/out",
                "--api-url",
                "https://appeears.earthdatacloud.nasa.gov/api/",
                "--product",
                "ECO_L2T_LSTE.002",
                "--layer",
                "LST",
                "--poll",
                "300",
                "--max-wait",
                "7200",
                "--credentials",
                "netrc",
                "--netrc",
                "/p/.netrc",
            ]
        );
        assert_eq!(plan.env.get("NETRC").map(String::as_str), Some("/p/.netrc"));
    }

    #[test]
    fn test_forwarded_flags_parse_as_downloader_config() {
        use crate::config::CliConfig;
        use crate::core::ConfigProvider;
        use clap::Parser;
        use std::time::Duration;

        let config = batch("[appeears]\nlayer = \"ETinst\"\nmax_wait_seconds = 60\n");
        let plan = LaunchPlan::for_task(&config, Period::new(2020, 2).unwrap());
        let cli = CliConfig::try_parse_from(
            std::iter::once(plan.program.clone()).chain(plan.args.iter().cloned()),
        )
        .unwrap();

        assert_eq!(cli.period(), Period::new(2020, 2).unwrap());
        assert_eq!(cli.layer(), "ETinst");
        assert_eq!(cli.max_wait(), Some(Duration::from_secs(60)));
        assert_eq!(cli.credentials, CredentialSource::Auto);
    }

    #[test]
    fn test_other_downloaders_get_only_period_and_paths() {
        let config = batch(
            r#"
[downloader]
program = "python"
args = ["scripts/ecostress_monthly.py"]

[credentials]
netrc_path = "/p/.netrc"
"#,
        );
        let plan = LaunchPlan::for_task(&config, Period::new(2021, 1).unwrap());

        assert_eq!(plan.args.len(), 9);
        assert!(!plan.args.contains(&"--product".to_string()));
        assert_eq!(plan.env.get("NETRC").map(String::as_str), Some("/p/.netrc"));
    }

    #[test]
    fn test_forwarding_can_be_forced() {
        let config = batch(
            "[downloader]\nprogram = \"/opt/bin/ecostress-monthly\"\nforward_settings = false\n",
        );
        assert!(!config.downloader.forwards_settings());

        let config = batch("[downloader]\nprogram = \"/opt/bin/ecostress-monthly\"\n");
        assert!(config.downloader.forwards_settings());

        let config = batch("[downloader]\nprogram = \"wrapper.sh\"\nforward_settings = true\n");
        let plan = LaunchPlan::for_task(&config, Period::new(2021, 1).unwrap());
        assert!(plan.args.contains(&"--layer".to_string()));
    }

    #[tokio::test]
    async fn test_child_receives_derived_period() {
        let plan = LaunchPlan::for_period(
            &downloader(
                "sh",
                &["-c", r#"test "$1" = --year && test "$2" = 2021 && test "$4" = 1"#, "sh"],
            ),
            Period::new(2021, 1).unwrap(),
            None,
            None,
        );
        plan.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_child_environment_applied() {
        let mut config = downloader("sh", &["-c", r#"test "$PYTHONPATH" = /opt/ecostress/lib"#, "sh"]);
        config
            .env
            .insert("PYTHONPATH".to_string(), "/opt/ecostress/lib".to_string());
        let plan = LaunchPlan::for_period(&config, Period::new(2021, 1).unwrap(), None, None);
        plan.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit_reported() {
        let plan = LaunchPlan::for_period(
            &downloader("sh", &["-c", "exit 3", "sh"]),
            Period::new(2021, 1).unwrap(),
            None,
            None,
        );
        let err = plan.run().await.unwrap_err();
        assert!(matches!(err, BatchError::ChildProcess { code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let plan = LaunchPlan::for_period(
            &downloader("/nonexistent/ecostress-monthly", &[]),
            Period::new(2021, 1).unwrap(),
            None,
            None,
        );
        let err = plan.run().await.unwrap_err();
        assert!(matches!(err, BatchError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_prepare_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = PathsConfig {
            aoi: None,
            outdir: Some(dir.path().join("data/raw/ECOSTRESS")),
            log_dir: dir.path().join("logs/ecostress"),
        };
        prepare_directories(&paths).await.unwrap();
        assert!(dir.path().join("logs/ecostress").is_dir());
        assert!(dir.path().join("data/raw/ECOSTRESS").is_dir());
    }
}

use crate::config::credentials::{CredentialSource, PASS_VAR, USER_VAR};
use crate::config::toml_config::BatchConfig;
use crate::core::launcher::shell_quote;
use crate::utils::error::Result;
use std::path::Path;

/// Renders the Slurm array submission script for `config`. The script runs
/// one `array-task` per month of the window, each reading the same config
/// file from `config_path`.
pub fn render_sbatch(config: &BatchConfig, config_path: &Path) -> Result<String> {
    let window = config.window()?;
    let scheduler = &config.scheduler;
    let log_dir = config.paths.log_dir.display().to_string();

    let mut lines: Vec<String> = Vec::new();
    lines.push("#!/bin/bash".to_string());
    lines.push(format!("#SBATCH --job-name={}", scheduler.job_name));
    lines.push(format!(
        "#SBATCH --output={}/{}_%A_%a.out",
        log_dir, scheduler.job_name
    ));
    lines.push(format!(
        "#SBATCH --error={}/{}_%A_%a.err",
        log_dir, scheduler.job_name
    ));
    lines.push(format!("#SBATCH --time={}", scheduler.time));
    lines.push(format!("#SBATCH --mem={}", scheduler.mem));
    lines.push(format!("#SBATCH --cpus-per-task={}", scheduler.cpus));
    if let Some(partition) = &scheduler.partition {
        lines.push(format!("#SBATCH --partition={}", partition));
    }
    if let Some(account) = &scheduler.account {
        lines.push(format!("#SBATCH --account={}", account));
    }
    lines.push(format!("#SBATCH --array={}", window.array_range()));
    lines.push(String::new());

    lines.push(format!(
        "# {}: task 1 = {}, task {} = {}",
        config.project.name,
        window.period_for_task(1)?,
        window.task_count(),
        window.period_for_task(window.task_count())?
    ));
    lines.push("set -euo pipefail".to_string());
    lines.push(String::new());

    lines.push(format!("mkdir -p {}", shell_quote(&log_dir)));
    if let Some(outdir) = &config.paths.outdir {
        lines.push(format!("mkdir -p {}", shell_quote(&outdir.display().to_string())));
    }

    for module in &scheduler.modules {
        lines.push(format!("module load {}", shell_quote(module)));
    }
    for line in &scheduler.setup {
        lines.push(line.clone());
    }
    lines.push(String::new());

    render_credential_check(&mut lines, config)?;

    lines.push(format!(
        "{} --config {} --log-json",
        shell_quote(&scheduler.array_task_bin),
        shell_quote(&config_path.display().to_string())
    ));

    lines.push(String::new());
    Ok(lines.join("\n"))
}

/// Credentials are checked for presence only; their values never appear in
/// the script.
fn render_credential_check(lines: &mut Vec<String>, config: &BatchConfig) -> Result<()> {
    let env_check = format!(
        ": \"${{{}:?export {} before sbatch}}\"\n: \"${{{}:?export {} before sbatch}}\"",
        USER_VAR, USER_VAR, PASS_VAR, PASS_VAR
    );

    match config.credentials.source {
        CredentialSource::Env => {
            lines.push(env_check);
        }
        CredentialSource::Netrc => {
            let netrc = config.credentials.netrc_location()?;
            let netrc = shell_quote(&netrc.display().to_string());
            lines.push(format!(
                "test -r {} || {{ echo \"missing netrc {}\" >&2; exit 1; }}",
                netrc, netrc
            ));
        }
        CredentialSource::Auto => {
            lines.push(format!(
                "if [[ -z \"${{{}:-}}\" || -z \"${{{}:-}}\" ]]; then",
                USER_VAR, PASS_VAR
            ));
            lines.push(
                r#"  test -r "${NETRC:-$HOME/.netrc}" || { echo "no Earthdata credentials" >&2; exit 1; }"#
                    .to_string(),
            );
            lines.push("fi".to_string());
        }
    }
    Ok(())
}

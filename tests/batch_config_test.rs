use ecostress_batch::core::launcher::prepare_directories;
use ecostress_batch::core::sbatch::render_sbatch;
use ecostress_batch::utils::validation::Validate;
use ecostress_batch::{BatchConfig, BatchError, LaunchPlan, Period};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

fn batch_toml(root: &Path) -> String {
    format!(
        r#"
[project]
name = "iowa-ecostress"
description = "Monthly ET for the Iowa AOI"

[window]
start_year = 2019
years = 5

[paths]
aoi = "{root}/data/aoi/iowa.geojson"
outdir = "{root}/data/raw/ECOSTRESS"
log_dir = "{root}/logs/ecostress"

[credentials]
source = "netrc"
netrc_path = "{root}/.netrc"

[downloader]
program = "python"
args = ["scripts/ecostress_monthly.py"]

[downloader.env]
PYTHONPATH = "{root}/lib"

[scheduler]
job_name = "eco-iowa"
time = "06:00:00"
mem = "16G"
cpus = 2
account = "ag-water"
setup = ["source {root}/venv/bin/activate"]
"#,
        root = root.display()
    )
}

#[test]
fn test_every_array_task_gets_a_distinct_month() {
    let dir = TempDir::new().unwrap();
    let config = BatchConfig::from_toml_str(&batch_toml(dir.path())).unwrap();
    config.validate().unwrap();

    let window = config.window().unwrap();
    assert_eq!(window.task_count(), 60);

    let periods: HashSet<Period> = (1..=60)
        .map(|t| window.period_for_task(t).unwrap())
        .collect();
    assert_eq!(periods.len(), 60);
    assert_eq!(window.period_for_task(25).unwrap(), Period::new(2021, 1).unwrap());
    assert!(matches!(
        window.period_for_task(61),
        Err(BatchError::TaskOutOfRange { task_id: 61, max: 60 })
    ));
}

#[test]
fn test_launch_plan_from_batch_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().display().to_string();
    let config = BatchConfig::from_toml_str(&batch_toml(dir.path())).unwrap();
    let period = config.window().unwrap().period_for_task(25).unwrap();

    let plan = LaunchPlan::for_period(
        &config.downloader,
        period,
        config.paths.aoi.as_deref(),
        config.paths.outdir.as_deref(),
    );

    assert_eq!(plan.program, "python");
    assert_eq!(
        plan.args,
        vec![
            "scripts/ecostress_monthly.py".to_string(),
            "--year".to_string(),
            "2021".to_string(),
            "--month".to_string(),
            "1".to_string(),
            "--aoi".to_string(),
            format!("{root}/data/aoi/iowa.geojson"),
            "--outdir".to_string(),
            format!("{root}/data/raw/ECOSTRESS"),
        ]
    );
    assert_eq!(plan.env.get("PYTHONPATH"), Some(&format!("{root}/lib")));
}

#[test]
fn test_task_plan_exports_netrc_for_external_downloader() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().display().to_string();
    let config = BatchConfig::from_toml_str(&batch_toml(dir.path())).unwrap();

    let plan = LaunchPlan::for_task(&config, Period::new(2021, 1).unwrap());

    assert_eq!(plan.args.len(), 9);
    assert_eq!(plan.env.get("NETRC"), Some(&format!("{root}/.netrc")));
    assert_eq!(plan.env.get("PYTHONPATH"), Some(&format!("{root}/lib")));
}

#[test]
fn test_task_plan_forwards_settings_to_own_downloader() {
    let dir = TempDir::new().unwrap();
    let content = batch_toml(dir.path())
        .replace("program = \"python\"", "program = \"ecostress-monthly\"")
        .replace("args = [\"scripts/ecostress_monthly.py\"]", "args = []");
    let content = format!(
        "{content}\n[appeears]\nproduct = \"ECO_L2T_LSTE.002\"\nlayer = \"LST\"\npoll_seconds = 300\n"
    );
    let config = BatchConfig::from_toml_str(&content).unwrap();

    let plan = LaunchPlan::for_task(&config, Period::new(2021, 1).unwrap());
    let line = plan.command_line();

    assert!(line.starts_with("ecostress-monthly --year 2021 --month 1 --aoi "));
    assert!(line.contains(" --product ECO_L2T_LSTE.002 --layer LST --poll 300 "));
    assert!(line.contains(" --credentials netrc --netrc "));
    assert!(!line.contains("--max-wait"));
}

#[tokio::test]
async fn test_prepare_directories_from_batch_file() {
    let dir = TempDir::new().unwrap();
    let config = BatchConfig::from_toml_str(&batch_toml(dir.path())).unwrap();

    prepare_directories(&config.paths).await.unwrap();

    assert!(dir.path().join("logs/ecostress").is_dir());
    assert!(dir.path().join("data/raw/ECOSTRESS").is_dir());
}

#[test]
fn test_rendered_script_matches_window_and_credentials() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().display().to_string();
    let config = BatchConfig::from_toml_str(&batch_toml(dir.path())).unwrap();

    let script = render_sbatch(&config, Path::new("ecostress-batch.toml")).unwrap();

    assert!(script.contains("#SBATCH --array=1-60\n"));
    assert!(script.contains("#SBATCH --account=ag-water\n"));
    assert!(script.contains(&format!(
        "#SBATCH --output={root}/logs/ecostress/eco-iowa_%A_%a.out"
    )));
    assert!(script.contains("task 1 = 2019-01, task 60 = 2023-12"));
    assert!(script.contains(&format!("source {root}/venv/bin/activate\n")));
    assert!(script.contains(&format!("test -r {root}/.netrc")));
    assert!(script.contains("array-task --config ecostress-batch.toml --log-json"));
    assert!(!script.contains("EARTHDATA_PASS"));
}

#[test]
fn test_in_process_settings_follow_appeears_section() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n[appeears]\nlayer = \"ETinst\"\npoll_seconds = 30\nmax_wait_seconds = 7200\n",
        batch_toml(dir.path())
    );
    let config = BatchConfig::from_toml_str(&content).unwrap();
    let task = config.task_config(Period::new(2020, 2).unwrap()).unwrap();

    assert_eq!(task.appeears.layer, "ETinst");
    assert_eq!(task.appeears.poll_seconds, 30);
    assert_eq!(task.appeears.max_wait_seconds, Some(7200));
    assert_eq!(task.outdir, dir.path().join("data/raw/ECOSTRESS"));
}

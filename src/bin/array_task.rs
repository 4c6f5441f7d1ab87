use clap::Parser;
use ecostress_batch::config::toml_config::BatchConfig;
use ecostress_batch::core::launcher::prepare_directories;
use ecostress_batch::utils::error::BatchError;
use ecostress_batch::utils::{logger, validation::Validate};
use ecostress_batch::{
    AppeearsClient, DownloadEngine, LaunchPlan, LocalStorage, MonthlyPipeline, Period,
    PeriodWindow,
};

#[derive(Parser)]
#[command(name = "array-task")]
#[command(about = "Run the ECOSTRESS download for one scheduler array task")]
struct Args {
    /// Path to the batch TOML file
    #[arg(short, long, default_value = "ecostress-batch.toml")]
    config: String,

    /// 1-based array index; Slurm sets it for every task
    #[arg(long, env = "SLURM_ARRAY_TASK_ID")]
    task_id: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, help = "Emit JSON log lines")]
    log_json: bool,

    /// Download in this process instead of launching the configured program
    #[arg(long)]
    in_process: bool,

    #[arg(long, help = "Log CPU and memory usage per phase (in-process only)")]
    monitor: bool,

    /// Show the period and command without running anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logger::init(args.verbose, args.log_json);

    tracing::info!("🚀 Starting array task {}", args.task_id);
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match BatchConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let window = match config.window() {
        Ok(window) => window,
        Err(e) => exit_with(e),
    };
    let period = match window.period_for_task(args.task_id) {
        Ok(period) => period,
        Err(e) => exit_with(e),
    };
    tracing::info!("Task {} -> {}", args.task_id, period);

    display_config_summary(&config, &args, window, period);

    let plan = LaunchPlan::for_task(&config, period);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be launched");
        if args.in_process {
            println!("Would download {} in-process", period);
        } else {
            println!("Would run: {}", plan.command_line());
        }
        return Ok(());
    }

    if let Err(e) = prepare_directories(&config.paths).await {
        exit_with(e);
    }

    let outcome = if args.in_process {
        run_in_process(&config, period, args.monitor).await
    } else {
        plan.run().await
    };

    match outcome {
        Ok(()) => {
            tracing::info!("✅ Array task {} ({}) finished", args.task_id, period);
            println!("✅ Array task {} ({}) finished", args.task_id, period);
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

async fn run_in_process(
    config: &BatchConfig,
    period: Period,
    monitor_enabled: bool,
) -> ecostress_batch::Result<()> {
    let task = config.task_config(period)?;
    let credentials = config.credentials.resolve()?;
    let api = AppeearsClient::new(&config.appeears.api_url, credentials)?;
    let storage = LocalStorage::new(task.outdir.clone());

    let pipeline = MonthlyPipeline::new(api, storage, task);
    let mut engine = DownloadEngine::new_with_monitoring(pipeline, monitor_enabled);
    let summary = engine.run().await?;

    tracing::info!(
        "📁 {} downloaded, {} already present in {}",
        summary.downloaded.len(),
        summary.skipped.len(),
        summary.outdir.display()
    );
    Ok(())
}

fn display_config_summary(
    config: &BatchConfig,
    args: &Args,
    window: PeriodWindow,
    period: Period,
) {
    println!("📋 Configuration Summary:");
    println!("  Project: {}", config.project.name);
    if let Some(description) = &config.project.description {
        println!("  Description: {}", description);
    }
    println!(
        "  Window: {}-{} ({} tasks)",
        window.start_year,
        window.end_year(),
        window.task_count()
    );
    println!("  Task: {} -> {}", args.task_id, period);
    println!("  Product: {} / {}", config.appeears.product, config.appeears.layer);
    if let Some(outdir) = &config.paths.outdir {
        println!("  Output: {}", period.partition_dir(outdir).display());
    }
    println!("  Logs: {}", config.paths.log_dir.display());
    println!(
        "  Mode: {}",
        if args.in_process {
            "in-process"
        } else {
            config.downloader.program.as_str()
        }
    );

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn exit_with(e: BatchError) -> ! {
    tracing::error!(
        "❌ Array task failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    std::process::exit(e.severity().exit_code());
}

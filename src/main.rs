use clap::Parser;
use ecostress_batch::utils::error::BatchError;
use ecostress_batch::utils::{logger, validation::Validate};
use ecostress_batch::{AppeearsClient, CliConfig, DownloadEngine, LocalStorage, MonthlyPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init(config.verbose, config.log_json);

    tracing::info!("Starting ecostress-monthly for {}-{:02}", config.year, config.month);
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let credentials = match config.credentials_config().resolve() {
        Ok(credentials) => credentials,
        Err(e) => exit_with(e),
    };
    let api = match AppeearsClient::new(&config.api_url, credentials) {
        Ok(api) => api,
        Err(e) => exit_with(e),
    };

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.outdir.clone());
    let pipeline = MonthlyPipeline::new(api, storage, config);
    let mut engine = DownloadEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(summary) => {
            tracing::info!("✅ Download complete for {}", summary.period);
            tracing::info!("📁 Files in: {}", summary.outdir.display());
            println!(
                "✅ {} task {}{}",
                summary.period,
                summary.task_id,
                if summary.resumed { " (resumed)" } else { "" }
            );
            println!(
                "   {} downloaded, {} already present",
                summary.downloaded.len(),
                summary.skipped.len()
            );
            println!("📁 {}", summary.outdir.display());
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: BatchError) -> ! {
    tracing::error!(
        "❌ Monthly download failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    std::process::exit(e.severity().exit_code());
}

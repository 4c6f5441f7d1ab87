use clap::Parser;
use ecostress_batch::core::sbatch::render_sbatch;
use ecostress_batch::utils::{logger, validation::Validate};
use ecostress_batch::BatchConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "render-sbatch")]
#[command(about = "Write the Slurm array script for a batch TOML file")]
struct Args {
    /// Path to the batch TOML file
    #[arg(short, long, default_value = "ecostress-batch.toml")]
    config: PathBuf,

    /// Write the script here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let config = BatchConfig::from_file(&args.config)?;
    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    // Array tasks read the config by the path given here, relative to the
    // directory sbatch is run from.
    let script = render_sbatch(&config, &args.config)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &script)?;
            tracing::info!("Wrote {}", path.display());
            println!("✅ Submit with: sbatch {}", path.display());
        }
        None => print!("{}", script),
    }

    Ok(())
}

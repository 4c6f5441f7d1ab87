pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::toml_config::BatchConfig;
pub use crate::config::{cli::LocalStorage, CliConfig};
pub use crate::core::appeears::AppeearsClient;
pub use crate::core::launcher::LaunchPlan;
pub use crate::core::{engine::DownloadEngine, pipeline::MonthlyPipeline};
pub use crate::domain::period::{Period, PeriodWindow};
pub use crate::utils::error::{BatchError, Result};

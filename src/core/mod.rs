pub mod aoi;
pub mod appeears;
pub mod engine;
pub mod launcher;
pub mod pipeline;
pub mod sbatch;

pub use crate::domain::model::{
    Bundle, DownloadSummary, Manifest, TaskHandle, TaskRequest, TaskStatus,
};
pub use crate::domain::period::{Period, PeriodWindow};
pub use crate::domain::ports::{AppeearsApi, ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;

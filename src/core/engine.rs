use crate::core::{DownloadSummary, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// Drives a pipeline through its three phases with progress logging.
pub struct DownloadEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> DownloadEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&mut self) -> Result<DownloadSummary> {
        tracing::info!("🚀 Starting monthly download");
        self.monitor.log_stats("Start");

        let handle = self.pipeline.prepare().await?;
        self.monitor.log_stats("Prepare");

        tracing::info!("⏳ Waiting for task {} to complete...", handle.task_id);
        self.pipeline.wait(&handle).await?;
        self.monitor.log_stats("Wait");

        tracing::info!("📦 Downloading bundle...");
        let summary = self.pipeline.fetch(&handle).await?;
        tracing::info!(
            "Fetched {} new files, {} already present",
            summary.downloaded.len(),
            summary.skipped.len()
        );

        self.monitor.log_final_stats();
        Ok(summary)
    }
}

use crate::core::aoi::load_aoi;
use crate::core::{
    AppeearsApi, ConfigProvider, DownloadSummary, Manifest, Pipeline, Storage, TaskHandle,
    TaskRequest, TaskStatus,
};
use crate::utils::error::{BatchError, Result};
use std::time::Instant;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Submits (or resumes) the AppEEARS task for one month, waits for it and
/// downloads its bundle into the month's partition directory.
pub struct MonthlyPipeline<A: AppeearsApi, S: Storage, C: ConfigProvider> {
    api: A,
    storage: S,
    config: C,
}

impl<A: AppeearsApi, S: Storage, C: ConfigProvider> MonthlyPipeline<A, S, C> {
    pub fn new(api: A, storage: S, config: C) -> Self {
        Self {
            api,
            storage,
            config,
        }
    }

    fn manifest_path(&self) -> String {
        format!("{}/{}", self.config.period().partition_key(), MANIFEST_FILE)
    }

    async fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        if self.storage.file_size(&path).await?.is_none() {
            return Ok(None);
        }
        let data = self.storage.read_file(&path).await?;
        let manifest: Manifest = serde_json::from_slice(&data)?;

        let period = self.config.period();
        if manifest.year != period.year || manifest.month != period.month {
            return Err(BatchError::config(format!(
                "{} belongs to {}-{:02}, not {}",
                self.storage.location(&path).display(),
                manifest.year,
                manifest.month,
                period
            )));
        }
        Ok(Some(manifest))
    }
}

#[async_trait::async_trait]
impl<A: AppeearsApi, S: Storage, C: ConfigProvider> Pipeline for MonthlyPipeline<A, S, C> {
    async fn prepare(&mut self) -> Result<TaskHandle> {
        tracing::info!("🔐 Authenticating with NASA Earthdata...");
        self.api.login().await?;
        tracing::info!("Authentication successful");

        if let Some(manifest) = self.read_manifest().await? {
            tracing::info!("♻️ Resuming existing task: {}", manifest.task_id);
            return Ok(TaskHandle {
                task_id: manifest.task_id,
                resumed: true,
            });
        }

        let period = self.config.period();
        let geo = load_aoi(self.config.aoi_path()).await?;
        let request = TaskRequest::area(period, self.config.product(), self.config.layer(), geo);

        tracing::info!("📡 Submitting new task: {}", request.task_name);
        let task_id = self.api.submit_task(&request).await?;

        let manifest = Manifest::for_request(task_id.clone(), period, &request);
        let manifest_path = self.manifest_path();
        self.storage
            .write_file(&manifest_path, &serde_json::to_vec_pretty(&manifest)?)
            .await?;
        tracing::info!("Task submitted: {}", task_id);
        tracing::info!(
            "Manifest saved: {}",
            self.storage.location(&manifest_path).display()
        );

        Ok(TaskHandle {
            task_id,
            resumed: false,
        })
    }

    async fn wait(&self, handle: &TaskHandle) -> Result<()> {
        let start = Instant::now();
        let poll = self.config.poll_interval();

        loop {
            let status = self.api.task_status(&handle.task_id).await?;
            let elapsed = start.elapsed();
            tracing::info!(
                "Task status: {} (elapsed: {:.1} min)",
                status.as_str(),
                elapsed.as_secs_f64() / 60.0
            );

            if status == TaskStatus::Done {
                return Ok(());
            }
            if status.is_failure() {
                return Err(BatchError::TaskFailed {
                    task_id: handle.task_id.clone(),
                    status: status.as_str().to_string(),
                });
            }
            if let Some(max_wait) = self.config.max_wait() {
                if elapsed >= max_wait {
                    return Err(BatchError::PollTimeout {
                        task_id: handle.task_id.clone(),
                        status: status.as_str().to_string(),
                        waited_secs: elapsed.as_secs(),
                    });
                }
            }

            tokio::time::sleep(poll).await;
        }
    }

    async fn fetch(&self, handle: &TaskHandle) -> Result<DownloadSummary> {
        let period = self.config.period();
        let partition = period.partition_key();

        let bundle = self.api.bundle(&handle.task_id).await?;
        tracing::info!("Bundle contains {} files", bundle.files.len());

        let mut downloaded = Vec::new();
        let mut skipped = Vec::new();

        for file in &bundle.files {
            let name = file
                .local_name()
                .ok_or_else(|| BatchError::InvalidBundleEntry {
                    task_id: handle.task_id.clone(),
                    file_name: file.file_name.clone(),
                })?;
            let path = format!("{}/{}", partition, name);

            if matches!(self.storage.file_size(&path).await?, Some(size) if size > 0) {
                tracing::info!("Skipping (exists): {}", name);
                skipped.push(name.to_string());
                continue;
            }

            tracing::info!("⬇️ Downloading: {}", name);
            let mut writer = self.storage.create_file(&path).await?;
            let received = self
                .api
                .download_file(&handle.task_id, &file.file_id, &mut writer)
                .await?;
            self.storage.commit_file(&path, writer).await?;
            if let Some(expected) = file.file_size {
                if expected != received {
                    tracing::warn!(
                        "{}: bundle lists {} bytes, received {}",
                        name,
                        expected,
                        received
                    );
                }
            }
            downloaded.push(name.to_string());
        }

        Ok(DownloadSummary {
            task_id: handle.task_id.clone(),
            period,
            outdir: self.storage.location(&partition),
            downloaded,
            skipped,
            resumed: handle.resumed,
        })
    }
}

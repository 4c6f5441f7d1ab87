use crate::domain::model::{Bundle, DownloadSummary, TaskHandle, TaskRequest, TaskStatus};
use crate::domain::period::Period;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Paths are relative to the storage root.
pub trait Storage: Send + Sync {
    /// Sink for a file written in pieces; nothing is visible at `path` until
    /// `commit_file`.
    type Writer: AsyncWrite + Unpin + Send;

    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn create_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Self::Writer>> + Send;
    fn commit_file(
        &self,
        path: &str,
        writer: Self::Writer,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// `None` when the file does not exist.
    fn file_size(&self, path: &str)
        -> impl std::future::Future<Output = Result<Option<u64>>> + Send;
    fn location(&self, path: &str) -> PathBuf;
}

pub trait ConfigProvider: Send + Sync {
    fn period(&self) -> Period;
    fn aoi_path(&self) -> &Path;
    fn product(&self) -> &str;
    fn layer(&self) -> &str;
    fn poll_interval(&self) -> Duration;
    fn max_wait(&self) -> Option<Duration>;
}

/// The slice of the AppEEARS REST API the downloader uses. Implementations
/// hold the bearer token after `login`.
#[async_trait]
pub trait AppeearsApi: Send + Sync {
    async fn login(&mut self) -> Result<()>;
    async fn submit_task(&self, request: &TaskRequest) -> Result<String>;
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus>;
    async fn bundle(&self, task_id: &str) -> Result<Bundle>;
    /// Streams one bundle file into `out` and returns the bytes written.
    async fn download_file(
        &self,
        task_id: &str,
        file_id: &str,
        out: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Authenticate, then resume the task named by an existing manifest or
    /// submit a new one.
    async fn prepare(&mut self) -> Result<TaskHandle>;
    async fn wait(&self, handle: &TaskHandle) -> Result<()>;
    async fn fetch(&self, handle: &TaskHandle) -> Result<DownloadSummary>;
}

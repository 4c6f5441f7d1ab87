use crate::core::Storage;
use crate::utils::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Downloads land in a `.part` sibling until committed, so an interrupted
/// task never leaves a truncated file that a rerun would treat as finished.
fn partial_path(full_path: &Path) -> PathBuf {
    let mut partial = full_path.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

impl Storage for LocalStorage {
    type Writer = BufWriter<fs::File>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.location(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut writer = self.create_file(path).await?;
        writer.write_all(data).await?;
        self.commit_file(path, writer).await
    }

    async fn create_file(&self, path: &str) -> Result<Self::Writer> {
        let full_path = self.location(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::File::create(partial_path(&full_path)).await?;
        Ok(BufWriter::new(file))
    }

    async fn commit_file(&self, path: &str, mut writer: Self::Writer) -> Result<()> {
        writer.flush().await?;
        drop(writer);
        let full_path = self.location(path);
        fs::rename(partial_path(&full_path), &full_path).await?;
        Ok(())
    }

    async fn file_size(&self, path: &str) -> Result<Option<u64>> {
        match fs::metadata(self.location(path)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

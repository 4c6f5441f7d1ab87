use crate::domain::period::Period;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Body of `POST task` for an AppEEARS area request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_type: String,
    pub task_name: String,
    pub params: TaskParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParams {
    pub dates: Vec<DateRange>,
    pub layers: Vec<LayerSpec>,
    pub output: OutputSpec,
    pub geo: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub product: String,
    pub layer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub format: OutputFormat,
    pub projection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TaskRequest {
    /// Monthly GeoTIFF request in geographic projection.
    pub fn area(
        period: Period,
        product: &str,
        layer: &str,
        geo: serde_json::Value,
    ) -> Self {
        let (start_date, end_date) = period.date_range_mmddyyyy();
        Self {
            task_type: "area".to_string(),
            task_name: period.task_name(layer),
            params: TaskParams {
                dates: vec![DateRange {
                    start_date,
                    end_date,
                }],
                layers: vec![LayerSpec {
                    product: product.to_string(),
                    layer: layer.to_string(),
                }],
                output: OutputSpec {
                    format: OutputFormat {
                        kind: "geotiff".to_string(),
                    },
                    projection: "geographic".to_string(),
                },
                geo,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Pending,
    Processing,
    Done,
    Error,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => TaskStatus::Queued,
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "done" => TaskStatus::Done,
            "error" => TaskStatus::Error,
            "failed" => TaskStatus::Failed,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
            TaskStatus::Failed => "failed",
            TaskStatus::Other(s) => s,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Error | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFile {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl BundleFile {
    /// Bundle entries may carry a subfolder (`dir/file.tif`); only the base
    /// name is kept on disk. `None` for names that would not stay inside the
    /// partition directory (`dir/`, `.`, `..`).
    pub fn local_name(&self) -> Option<&str> {
        let name = self.file_name.rsplit(|c: char| c == '/' || c == '\\').next()?;
        match name {
            "" | "." | ".." => None,
            name => Some(name),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub files: Vec<BundleFile>,
}

/// Written next to the downloaded files once a task is submitted. Its
/// presence turns a rerun into a resume of the same AppEEARS task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub task_id: String,
    pub task_name: String,
    pub year: i32,
    pub month: u32,
    pub start_date: String,
    pub end_date: String,
    pub product: String,
    pub layer: String,
}

impl Manifest {
    pub fn for_request(task_id: String, period: Period, request: &TaskRequest) -> Self {
        let (start_date, end_date) = period.date_range_mmddyyyy();
        let (product, layer) = request
            .params
            .layers
            .first()
            .map(|l| (l.product.clone(), l.layer.clone()))
            .unwrap_or_default();
        Self {
            task_id,
            task_name: request.task_name.clone(),
            year: period.year,
            month: period.month,
            start_date,
            end_date,
            product,
            layer,
        }
    }
}

/// An AppEEARS task this run is responsible for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub resumed: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub task_id: String,
    pub period: Period,
    pub outdir: PathBuf,
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub resumed: bool,
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Missing credentials: {message}")]
    MissingCredentials { message: String },

    #[error("Invalid area of interest '{path}': {reason}")]
    InvalidAoi { path: String, reason: String },

    #[error("Task id {task_id} is outside the array range 1-{max}")]
    TaskOutOfRange { task_id: u32, max: u32 },

    #[error("AppEEARS returned HTTP {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("AppEEARS task {task_id} lists an unusable file name '{file_name}'")]
    InvalidBundleEntry { task_id: String, file_name: String },

    #[error("AppEEARS task {task_id} ended with status '{status}'")]
    TaskFailed { task_id: String, status: String },

    #[error("AppEEARS task {task_id} still '{status}' after {waited_secs}s")]
    PollTimeout {
        task_id: String,
        status: String,
        waited_secs: u64,
    },

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {}", describe_exit(.code))]
    ChildProcess { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Remote,
    Filesystem,
    Configuration,
    Credentials,
    Process,
}

/// Maps to the process exit code in the binaries: Medium failures are worth
/// resubmitting as-is, High ones need a config or input fix first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl BatchError {
    pub fn config(message: impl Into<String>) -> Self {
        BatchError::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BatchError::ApiError(_) => ErrorCategory::Network,
            BatchError::ApiStatus { .. }
            | BatchError::TaskFailed { .. }
            | BatchError::InvalidBundleEntry { .. }
            | BatchError::PollTimeout { .. } => ErrorCategory::Remote,
            BatchError::IoError(_) | BatchError::SerializationError(_) => {
                ErrorCategory::Filesystem
            }
            BatchError::TomlError(_)
            | BatchError::ConfigError { .. }
            | BatchError::InvalidConfigValueError { .. }
            | BatchError::MissingConfigError { .. }
            | BatchError::InvalidAoi { .. }
            | BatchError::TaskOutOfRange { .. } => ErrorCategory::Configuration,
            BatchError::MissingCredentials { .. } => ErrorCategory::Credentials,
            BatchError::Spawn { .. } | BatchError::ChildProcess { .. } => ErrorCategory::Process,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BatchError::ApiError(_) | BatchError::PollTimeout { .. } => ErrorSeverity::Medium,
            BatchError::ApiStatus { status, .. } if *status >= 500 || *status == 429 => {
                ErrorSeverity::Medium
            }
            BatchError::ChildProcess { code: Some(2), .. } => ErrorSeverity::Medium,
            BatchError::IoError(_) | BatchError::Spawn { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BatchError::ApiError(_) => {
                "Check network access from the compute node and resubmit the array task"
            }
            BatchError::ApiStatus { status: 401, .. } | BatchError::ApiStatus { status: 403, .. } => {
                "Verify the Earthdata account and that AppEEARS access is approved"
            }
            BatchError::ApiStatus { .. } => {
                "Inspect the response body; resubmit once AppEEARS is reachable"
            }
            BatchError::TaskFailed { .. } => {
                "Check the task in the AppEEARS web UI, remove manifest.json and resubmit"
            }
            BatchError::InvalidBundleEntry { .. } => {
                "Download the listed file from the AppEEARS web UI and report the bundle"
            }
            BatchError::PollTimeout { .. } => {
                "Resubmit the same task id; the manifest makes the rerun resume the task"
            }
            BatchError::IoError(_) => "Check that the output and log directories are writable",
            BatchError::SerializationError(_) => {
                "A manifest or response is not valid JSON; delete the manifest and retry"
            }
            BatchError::TomlError(_)
            | BatchError::ConfigError { .. }
            | BatchError::InvalidConfigValueError { .. }
            | BatchError::MissingConfigError { .. } => "Fix the batch configuration file",
            BatchError::MissingCredentials { .. } => {
                "Export EARTHDATA_USER/EARTHDATA_PASS or add urs.earthdata.nasa.gov to ~/.netrc"
            }
            BatchError::InvalidAoi { .. } => {
                "Provide a GeoJSON FeatureCollection, Feature or geometry in EPSG:4326"
            }
            BatchError::TaskOutOfRange { .. } => {
                "Make the scheduler --array range match the configured window"
            }
            BatchError::Spawn { .. } => "Check the downloader program path and PATH",
            BatchError::ChildProcess { .. } => "Read the downloader's log for the task",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem talking to AppEEARS: {self}"),
            ErrorCategory::Remote => format!("AppEEARS rejected the request: {self}"),
            ErrorCategory::Filesystem => format!("Could not read or write a file: {self}"),
            ErrorCategory::Configuration => format!("Configuration problem: {self}"),
            ErrorCategory::Credentials => format!("Earthdata login problem: {self}"),
            ErrorCategory::Process => format!("Downloader process failed: {self}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Dataset download failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Template rendering error: {0}")]
    TemplateError(#[from] askama::Error),

    #[error("Dataset not found: {path}")]
    DatasetNotFound { path: String },

    #[error("Dataset download returned HTTP {status} for {url}")]
    DownloadStatusError { url: String, status: u16 },

    #[error("Missing required column '{column}' in dataset header")]
    MissingColumnError { column: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Processing,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EtlError::DatasetNotFound { .. }
            | EtlError::MissingColumnError { .. }
            | EtlError::CsvError(_) => ErrorCategory::Input,
            EtlError::ApiError(_) | EtlError::DownloadStatusError { .. } => {
                ErrorCategory::Network
            }
            EtlError::ProcessingError { .. }
            | EtlError::SerializationError(_)
            | EtlError::TaskError(_) => ErrorCategory::Processing,
            EtlError::IoError(_) | EtlError::ZipError(_) | EtlError::TemplateError(_) => {
                ErrorCategory::Output
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Input | ErrorCategory::Processing => {
                ErrorSeverity::High
            }
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::DatasetNotFound { .. } => {
                "Place the licensing CSV at the configured dataset path or set source.dataset_url"
            }
            EtlError::MissingColumnError { .. } => {
                "Check source.columns in the config against the CSV header"
            }
            EtlError::CsvError(_) => "Make sure the dataset is a comma-separated file with a header row",
            EtlError::ApiError(_) | EtlError::DownloadStatusError { .. } => {
                "Check network access and source.dataset_url, then retry"
            }
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => "Fix the configuration file and run again",
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the output directories are writable and the disk is not full"
            }
            EtlError::SerializationError(_) => {
                "Delete the generated data directory and rerun preprocessing"
            }
            EtlError::TemplateError(_) | EtlError::ProcessingError { .. } | EtlError::TaskError(_) => {
                "Rerun with --verbose and inspect the logs"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read the dataset: {}", self),
            ErrorCategory::Network => format!("Could not download the dataset: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
            ErrorCategory::Output => format!("Could not write output: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Failed to rasterize PDF: {0}")]
    Rasterize(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("No text could be recovered from the document: {0}")]
    NoText(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    WriteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{key}': {source}")]
    ReadObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Artifact already exists for job {job_id} page {page}")]
    ArtifactExists { job_id: String, page: u32 },
}

#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker did not accept the message. `retryable` signals that the
    /// caller may re-enqueue once connectivity is restored.
    #[error("Message broker unreachable (retryable: {retryable})")]
    BrokerUnreachable { retryable: bool },

    #[error("Failed to publish job message: {0}")]
    PublishFailed(String),

    #[error("Queue channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid job status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, LedgerscanError>;

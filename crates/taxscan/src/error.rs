use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("Failed to start recognizer '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Recognizer exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to replace store file '{path}': {source}")]
    ReplaceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize job table: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Worker pool is no longer accepting jobs")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, TaxscanError>;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Mailbox error: {0}")]
    Mail(#[from] crate::mailbox::MailError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("No account configured at index {0}")]
    NoSuchAccount(usize),

    #[error("Failed to create browser profile directory: {0}")]
    ProfileDir(#[source] std::io::Error),

    #[error("Mailbox error: {0}")]
    Mail(#[from] crate::mailbox::MailError),

    #[error("Signup flow failed: {0}")]
    Signup(String),

    #[error("No verification code received within the timeout")]
    NoVerificationCode,
}

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to append record to '{path}': {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvisorError>;

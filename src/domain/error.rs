use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider: {0}")]
    Provider(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error("crm transport: {0}")]
    Http(#[from] reqwest::Error),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("All credentials exhausted after {attempts} attempt(s)")]
    AllCredentialsExhausted { attempts: usize },
}

pub type Result<T> = std::result::Result<T, AgentError>;

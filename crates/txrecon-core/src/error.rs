use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("upstream call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
}

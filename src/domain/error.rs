use {super::id::PaymentId, thiserror::Error};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("validation: {0}")]
    Validation(String),

    #[error("payment not found: {0}")]
    NotFound(PaymentId),

    #[error("entitlement: {0}")]
    Apply(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store: {0}")]
    Store(String),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("cleanup: {0}")]
    Cleanup(String),

    #[error("credentials: {0}")]
    Credentials(String),
}

impl PipelineError {
    /// True for failures the gateway is expected to retry by re-delivering.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Apply(_) | Self::Database(_) | Self::Store(_) | Self::Gateway(_)
        )
    }
}

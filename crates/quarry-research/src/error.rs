use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// The caller's token was already cancelled when the run was requested.
    #[error("research run cancelled before any collector started")]
    Cancelled,

    #[error("insight publish failed: {0}")]
    Publish(String),
}

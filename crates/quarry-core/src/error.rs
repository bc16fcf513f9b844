use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read project file {path}: {source}")]
    ProjectFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse project file: {0}")]
    ProjectFileParse(#[from] serde_yaml::Error),

    #[error("invalid project config: {0}")]
    Validation(String),
}

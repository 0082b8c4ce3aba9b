use thiserror::Error;

#[derive(Error, Debug)]
pub enum AKIError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Parameter validation error: {0}")]
    Validation(String),

    #[error("Malformed demographics source: {0}")]
    MalformedDemographics(String),

    #[error("eGFR estimation error: {0}")]
    Egfr(String),
}

pub type AKIResult<T> = Result<T, AKIError>;

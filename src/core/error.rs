use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: String, reason: String },

    /// Raised only when the built-in return parameters cannot form a normal
    /// distribution; request data never reaches this path.
    #[error("invalid return distribution for {asset_class}: {reason}")]
    Distribution { asset_class: String, reason: String },
}

impl SimulationError {
    pub(crate) fn invalid(field: &str, reason: &str) -> Self {
        SimulationError::InvalidInput {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type SimulationOutcome<T> = Result<T, SimulationError>;

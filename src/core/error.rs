use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("invalid {field}: {reason}")]
    Domain { field: &'static str, reason: String },

    #[error("non-finite value in {context}")]
    Numeric { context: String },
}

impl SimulationError {
    pub(crate) fn domain(field: &'static str, reason: impl Into<String>) -> Self {
        SimulationError::Domain {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn numeric(context: impl Into<String>) -> Self {
        SimulationError::Numeric {
            context: context.into(),
        }
    }
}

pub type SimulationOutcome<T> = Result<T, SimulationError>;

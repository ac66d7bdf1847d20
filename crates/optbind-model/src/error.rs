use thiserror::Error;

/// Recoverable failures of the binding layer. None of these should
/// escape the engine as a panic: validation failures keep the prior
/// value, binding failures keep the default, configuration failures
/// flag the one control and leave the rest of the graph running.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("value '{value}' is not a valid {expected}")]
    Validation {
        value: String,
        expected: &'static str,
    },
    #[error("bound value for '{control}' has an unexpected shape: {reason}")]
    Binding { control: String, reason: String },
    #[error("duplicate control name: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, BindError>;

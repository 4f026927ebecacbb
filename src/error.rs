use thiserror::Error;

/// Error types for the fdfit-rs library.
#[derive(Error, Debug)]
pub enum FitError {
    /// A substitution, default or registry lookup names a parameter that does not exist.
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Data transformations do not match the model or the global parameter set.
    #[error("Incompatible model: {0}")]
    IncompatibleModel(String),

    /// A Jacobian or derivative was requested but cannot be provided.
    #[error("Model {model} does not provide a {what}")]
    MissingDerivativeInfo { model: String, what: &'static str },

    /// Wrong number of elements in a vector or matrix.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// The inversion solver did not converge for one or more points.
    #[error("Function inversion failed for {failed} of {total} points: {message}")]
    InversionFailure {
        failed: usize,
        total: usize,
        message: String,
    },

    /// The optimizer could not make any progress.
    #[error("Algorithm failed to converge: {0}")]
    ConvergenceFailure(String),

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Invalid input data or configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FitError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        FitError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

impl From<crate::parameters::BoundsError> for FitError {
    fn from(err: crate::parameters::BoundsError) -> Self {
        FitError::InvalidInput(err.to_string())
    }
}

/// Result type alias for fdfit-rs operations.
pub type Result<T> = std::result::Result<T, FitError>;

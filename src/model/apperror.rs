use std::fmt;

/**
 * Represents the type of error that can occur within the application.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    Initialization,
    Validation,
    NotFound,
    DatabaseError,
    Upstream,
    Application,
}

impl ErrorType {
    /**
     * Short machine readable name of the error type, used in the error response body.
     */
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Initialization => "initialization",
            ErrorType::Validation => "validation",
            ErrorType::NotFound => "not_found",
            ErrorType::DatabaseError => "database",
            ErrorType::Upstream => "upstream",
            ErrorType::Application => "internal",
        }
    }
}

/**
 * Represents an error that occurs within the application.
 */
#[derive(Debug, Clone)]
pub struct ApplicationError {
    /**
     * Error type.
     */
    pub error_type: ErrorType,
    /**
     * Error message describing problem.
     */
    pub message: String,
}

impl ApplicationError {
    /**
     * Creates a new ApplicationError.
     *
     * #Arguments
     * `error_type`: The type of error.
     * `message`: A description of the error.
     */
    pub fn new(error_type: ErrorType, message: String) -> Self {
        ApplicationError { error_type, message }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApplicationError {}

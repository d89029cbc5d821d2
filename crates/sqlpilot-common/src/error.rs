use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// The completion service never produced a usable statement. Carries the
    /// raw last response so callers can display it for diagnosis.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The safety gate refused the statement. Terminal for the attempt; no
    /// fallback execution.
    #[error("statement rejected: {0}")]
    SafetyRejected(String),

    /// Engine-reported execution error. Carries the attempted SQL and the
    /// engine's message text; triggers exactly one repair round upstream.
    #[error("execution failed: {message} (sql: {sql})")]
    Execution { sql: String, message: String },

    /// A blocking call exceeded its caller-imposed bound. Distinct from a
    /// server or application error.
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors that should trigger the single execution-guided
    /// repair round.
    pub fn is_execution(&self) -> bool {
        matches!(self, Error::Execution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn execution_error_displays_sql_and_message() {
        let err = Error::Execution {
            sql: "SELECT x FROM t".to_string(),
            message: "no such column: x".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("no such column: x"));
        assert!(rendered.contains("SELECT x FROM t"));
    }

    #[test]
    fn timeout_is_not_an_execution_error() {
        assert!(!Error::Timeout("completion call".into()).is_execution());
        assert!(
            Error::Execution {
                sql: "SELECT 1".into(),
                message: "boom".into()
            }
            .is_execution()
        );
    }
}

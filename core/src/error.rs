use thiserror::Error;

/// Errors raised while parsing, rewriting, evaluating or persisting queries and indexes.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl QueryError {
    /// True for errors caused by the caller's input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind() {
        let e = QueryError::InvalidOperator("XOR".into());
        assert_eq!(e.to_string(), "invalid operator: XOR");
        assert!(e.is_client_error());
        let io = QueryError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(!io.is_client_error());
    }
}

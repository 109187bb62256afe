/// Failure classes of a run.
///
/// Each kind maps to a fixed process exit code. `Comparison` failures are
/// never fatal: the pipeline catches them, logs them and carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid required input (flags, geometry, model names).
    Configuration,
    /// Interpolation query outside the valid volume domain.
    OutOfBounds,
    /// The inference invocation failed or returned unusable output.
    Inference,
    /// Best-effort reference tool or plot failed.
    Comparison,
    /// Reading or writing run artifacts failed.
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::OutOfBounds => 3,
            ErrorKind::Inference => 4,
            ErrorKind::Comparison => 5,
            ErrorKind::Io => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::OutOfBounds => "out of bounds",
            ErrorKind::Inference => "inference failure",
            ErrorKind::Comparison => "comparison failure",
            ErrorKind::Io => "i/o error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfBounds, message)
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Inference, message)
    }

    pub fn comparison(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Comparison, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    /// Re-tag an error as a best-effort comparison failure.
    pub fn into_comparison(self) -> Self {
        Self {
            kind: ErrorKind::Comparison,
            message: self.message,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let kinds = [
            ErrorKind::Configuration,
            ErrorKind::OutOfBounds,
            ErrorKind::Inference,
            ErrorKind::Comparison,
            ErrorKind::Io,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn into_comparison_keeps_message() {
        let err = AppError::io("disk full").into_comparison();
        assert_eq!(err.kind(), ErrorKind::Comparison);
        assert_eq!(err.message(), "disk full");
        assert_eq!(err.to_string(), "comparison failure: disk full");
    }
}

// error.rs - Idiomatic Rust error type for gnurex.
//
// Groups the `RegErrcode` values into semantic variants while keeping the
// numeric code for interop.

use std::fmt;

use crate::regerror::regerror_message;
use crate::regex::RegErrcode;

/// Error type for regex compilation and matching operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// The allocator refused memory (`ESpace`).
    Memory,
    /// Malformed pattern.
    Syntax { code: i32, message: String },
    /// A compiled pattern was missing or inconsistent (`BadPat` at match
    /// time).
    InternalBug { code: i32, message: String },
    /// Code outside the known table.
    Other(i32),
}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegexError::Memory => write!(f, "memory exhausted"),
            RegexError::Syntax { message, .. } => write!(f, "syntax error: {}", message),
            RegexError::InternalBug { message, .. } => write!(f, "internal error: {}", message),
            RegexError::Other(code) => write!(f, "error code {}", code),
        }
    }
}

impl std::error::Error for RegexError {}

impl From<RegErrcode> for RegexError {
    fn from(code: RegErrcode) -> Self {
        match code {
            RegErrcode::ESpace => RegexError::Memory,
            c if c.is_pattern_error() => RegexError::Syntax {
                code: c.code(),
                message: regerror_message(c).to_string(),
            },
            c => RegexError::Other(c.code()),
        }
    }
}

impl From<i32> for RegexError {
    fn from(code: i32) -> Self {
        match RegErrcode::from_code(code) {
            Some(c) => RegexError::from(c),
            None => RegexError::Other(code),
        }
    }
}

impl RegexError {
    /// Error raised when matching finds no usable compiled pattern.
    pub(crate) fn internal(code: RegErrcode) -> Self {
        RegexError::InternalBug {
            code: code.code(),
            message: regerror_message(code).to_string(),
        }
    }

    /// Returns the numeric `RegErrcode` value.
    pub fn code(&self) -> i32 {
        match self {
            RegexError::Memory => RegErrcode::ESpace.code(),
            RegexError::Syntax { code, .. } => *code,
            RegexError::InternalBug { code, .. } => *code,
            RegexError::Other(code) => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_memory_error() {
        let err = RegexError::from(RegErrcode::ESpace);
        assert!(matches!(err, RegexError::Memory));
        assert_eq!(err.code(), 12);
        assert_eq!(err.to_string(), "memory exhausted");
    }

    #[test]
    fn from_syntax_error() {
        let err = RegexError::from(RegErrcode::EBrack);
        assert!(matches!(err, RegexError::Syntax { .. }));
        assert_eq!(err.code(), 7);
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn from_raw_code() {
        assert!(matches!(RegexError::from(8), RegexError::Syntax { code: 8, .. }));
        assert!(matches!(RegexError::from(1), RegexError::Other(1)));
        assert!(matches!(RegexError::from(-9999), RegexError::Other(-9999)));
    }

    #[test]
    fn internal_bug() {
        let err = RegexError::internal(RegErrcode::BadPat);
        assert!(matches!(err, RegexError::InternalBug { code: 2, .. }));
        assert!(err.to_string().starts_with("internal error"));
    }

    #[test]
    fn error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(RegexError::Memory);
        assert_eq!(err.to_string(), "memory exhausted");
    }
}

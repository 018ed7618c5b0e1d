use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Change on immutable object: {0}")]
    ChangeOnImmutable(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unexpected end of file: {0}")]
    UnexpectedEof(String),

    #[error("Internal logic error: {0}")]
    InternalLogic(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Compression error: {0}")]
    Compression(String),
}

/// Payload-free discriminant of a [`PdfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    InvalidHandle,
    InvalidDataType,
    InvalidKey,
    ValueOutOfRange,
    OutOfMemory,
    ChangeOnImmutable,
    FileNotFound,
    UnexpectedEof,
    InternalLogic,
    NotImplemented,
    Compression,
}

impl PdfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfError::Io(_) => ErrorKind::Io,
            PdfError::InvalidHandle(_) => ErrorKind::InvalidHandle,
            PdfError::InvalidDataType(_) => ErrorKind::InvalidDataType,
            PdfError::InvalidKey(_) => ErrorKind::InvalidKey,
            PdfError::ValueOutOfRange(_) => ErrorKind::ValueOutOfRange,
            PdfError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            PdfError::ChangeOnImmutable(_) => ErrorKind::ChangeOnImmutable,
            PdfError::FileNotFound(_) => ErrorKind::FileNotFound,
            PdfError::UnexpectedEof(_) => ErrorKind::UnexpectedEof,
            PdfError::InternalLogic(_) => ErrorKind::InternalLogic,
            PdfError::NotImplemented(_) => ErrorKind::NotImplemented,
            PdfError::Compression(_) => ErrorKind::Compression,
        }
    }

    pub(crate) fn invalid_type(expected: &str, found: impl std::fmt::Debug) -> Self {
        PdfError::InvalidDataType(format!("expected {expected}, found {found:?}"))
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind as IoErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::InvalidKey("Kids".to_string());
        assert_eq!(error.to_string(), "Invalid key: Kids");

        let error = PdfError::ChangeOnImmutable("array".to_string());
        assert_eq!(error.to_string(), "Change on immutable object: array");
    }

    #[test]
    fn test_pdf_error_debug() {
        let error = PdfError::InvalidHandle("object 1 0".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("InvalidHandle"));
        assert!(debug_str.contains("object 1 0"));
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(IoErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => {
                assert_eq!(err.kind(), IoErrorKind::NotFound);
            }
            _ => panic!("Expected IO error variant"),
        }
        assert_eq!(pdf_error.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_kind_matches_variant() {
        let errors = vec![
            (PdfError::InvalidHandle("h".into()), ErrorKind::InvalidHandle),
            (PdfError::InvalidDataType("t".into()), ErrorKind::InvalidDataType),
            (PdfError::InvalidKey("k".into()), ErrorKind::InvalidKey),
            (PdfError::ValueOutOfRange("r".into()), ErrorKind::ValueOutOfRange),
            (PdfError::OutOfMemory("m".into()), ErrorKind::OutOfMemory),
            (PdfError::ChangeOnImmutable("i".into()), ErrorKind::ChangeOnImmutable),
            (PdfError::FileNotFound("f".into()), ErrorKind::FileNotFound),
            (PdfError::UnexpectedEof("e".into()), ErrorKind::UnexpectedEof),
            (PdfError::InternalLogic("l".into()), ErrorKind::InternalLogic),
            (PdfError::NotImplemented("n".into()), ErrorKind::NotImplemented),
            (PdfError::Compression("c".into()), ErrorKind::Compression),
        ];

        for (error, kind) in errors {
            assert_eq!(error.kind(), kind);
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_invalid_type_helper() {
        let error = PdfError::invalid_type("Bool", "Name");
        assert_eq!(error.kind(), ErrorKind::InvalidDataType);
        assert!(error.to_string().contains("expected Bool"));
    }
}

//! `JvmError`: the single error type threaded through every public engine entry point.
//! Mirrors the error kinds in the design note on fatal-vs-propagated errors: every
//! resolution failure the source treats as a process abort instead becomes a value
//! here, lifted into a process exit only at the CLI boundary (`main.rs`).

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum JvmError {
    UnresolvedClass { name: String, source: Option<io::Error> },
    UnresolvedMethod { class: String, name: String, descriptor: String },
    UnresolvedField { class: String, name: String },
    NoMainMethod { class: String },
    UnknownOpcode { opcode: u8, pc: usize },
    NativeUnsupported { class: String, name: String },
    ClassFormat(ClassFormatError),
    UnsupportedDescriptor(String),
}

impl fmt::Display for JvmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JvmError::UnresolvedClass { name, .. } => {
                write!(f, "unresolved class: {}", name)
            }
            JvmError::UnresolvedMethod { class, name, descriptor } => {
                write!(f, "unresolved method: {}.{}:{}", class, name, descriptor)
            }
            JvmError::UnresolvedField { class, name } => {
                write!(f, "unresolved field: {}.{}", class, name)
            }
            JvmError::NoMainMethod { class } => {
                write!(f, "no main method in class: {}", class)
            }
            JvmError::UnknownOpcode { opcode, pc } => {
                write!(f, "unknown opcode {:#04x} at pc {}", opcode, pc)
            }
            JvmError::NativeUnsupported { class, name } => {
                write!(f, "native method not supported: {}.{}", class, name)
            }
            JvmError::ClassFormat(e) => write!(f, "malformed class file: {}", e.message),
            JvmError::UnsupportedDescriptor(d) => {
                write!(f, "unsupported descriptor element: {}", d)
            }
        }
    }
}

impl std::error::Error for JvmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JvmError::UnresolvedClass { source: Some(e), .. } => Some(e),
            _ => None,
        }
    }
}

impl From<ClassFormatError> for JvmError {
    fn from(e: ClassFormatError) -> Self {
        JvmError::ClassFormat(e)
    }
}

/// Raised by the class-file parser (§10); carries a human-readable position/context
/// message rather than a byte offset, since the parser has no need to resume after
/// a failure.
#[derive(Debug)]
pub struct ClassFormatError {
    pub message: String,
}

impl ClassFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        ClassFormatError { message: message.into() }
    }
}

impl fmt::Display for ClassFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ClassFormatError {}

impl From<io::Error> for ClassFormatError {
    fn from(e: io::Error) -> Self {
        ClassFormatError::new(e.to_string())
    }
}

//! Descriptor grammar and the byte-width conventions for the operand stack and locals.

use crate::error::{ClassFormatError, JvmError};
use byteorder::ReadBytesExt;
use std::io::{self, Cursor, Seek, SeekFrom};

/// Width in bytes of a reference value (object/array handle) on the stack and in locals.
pub const SZ_REF: usize = 8;

pub trait BufferedRead: Sized {
    fn read(buffer: &mut Cursor<Vec<u8>>) -> io::Result<Self>;
}

/// A parsed field or method descriptor. `Double`/`Float` are recognized syntactically
/// (so the cursor stays aligned) but rejected with `UnsupportedDescriptor` the moment
/// something tries to size a value of that type (see [`FieldDescriptor::byte_size`]).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDescriptor {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Object(String),
    Array(Box<FieldDescriptor>),

    // Only accessible as part of a method descriptor return type
    Void,
    Method {
        args: Vec<FieldDescriptor>,
        returns: Box<FieldDescriptor>,
    },
}

impl FieldDescriptor {
    /// Byte width this value occupies on the byte-addressed operand stack / locals region.
    pub fn byte_size(&self) -> Result<usize, JvmError> {
        Ok(match self {
            FieldDescriptor::Byte
            | FieldDescriptor::Char
            | FieldDescriptor::Int
            | FieldDescriptor::Short
            | FieldDescriptor::Boolean => 4,
            FieldDescriptor::Long => 8,
            FieldDescriptor::Object(_) | FieldDescriptor::Array(_) => SZ_REF,
            FieldDescriptor::Float | FieldDescriptor::Double => {
                return Err(JvmError::UnsupportedDescriptor(format!("{:?}", self)))
            }
            FieldDescriptor::Void | FieldDescriptor::Method { .. } => 0,
        })
    }

    /// Sum of the byte sizes of a method descriptor's parameters, in order, excluding
    /// the receiver. This is `args_len` from the spec.
    pub fn args_len(&self) -> Result<usize, JvmError> {
        match self {
            FieldDescriptor::Method { args, .. } => {
                let mut total = 0usize;
                for arg in args {
                    total += arg.byte_size()?;
                }
                Ok(total)
            }
            _ => Ok(0),
        }
    }
}

impl BufferedRead for FieldDescriptor {
    fn read(buffer: &mut Cursor<Vec<u8>>) -> io::Result<Self> {
        Ok(match buffer.read_u8()? {
            b'B' => FieldDescriptor::Byte,
            b'C' => FieldDescriptor::Char,
            b'D' => FieldDescriptor::Double,
            b'F' => FieldDescriptor::Float,
            b'I' => FieldDescriptor::Int,
            b'J' => FieldDescriptor::Long,
            b'S' => FieldDescriptor::Short,
            b'Z' => FieldDescriptor::Boolean,
            b'V' => FieldDescriptor::Void,
            b'[' => FieldDescriptor::Array(Box::new(FieldDescriptor::read(buffer)?)),
            b'L' => {
                let mut arr = Vec::new();
                loop {
                    match buffer.read_u8()? {
                        b';' => break,
                        x => arr.push(x),
                    }
                }

                FieldDescriptor::Object(match String::from_utf8(arr) {
                    Ok(v) => v,
                    Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                })
            }
            b'(' => {
                let mut args = Vec::new();
                loop {
                    match buffer.read_u8()? {
                        b')' => break,
                        _ => {
                            buffer.seek(SeekFrom::Current(-1))?;
                            args.push(FieldDescriptor::read(buffer)?);
                        }
                    }
                }

                FieldDescriptor::Method {
                    args,
                    returns: Box::new(FieldDescriptor::read(buffer)?),
                }
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed field descriptor, leading byte {:#x}", other),
                ))
            }
        })
    }
}

pub fn parse_descriptor(text: &str) -> Result<FieldDescriptor, ClassFormatError> {
    let mut cursor = Cursor::new(text.as_bytes().to_vec());
    FieldDescriptor::read(&mut cursor)
        .map_err(|e| ClassFormatError::new(format!("bad descriptor {:?}: {}", text, e)))
}

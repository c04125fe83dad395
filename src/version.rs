use std::cmp::Ordering;
use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt};

use crate::types::BufferedRead;

pub fn check_magic_number(buffer: &mut Cursor<Vec<u8>>) -> io::Result<bool> {
    let magic = buffer.read_u32::<BigEndian>()?;
    Ok(magic == 0xCAFEBABE)
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ClassVersion(pub u16, pub u16);

impl BufferedRead for ClassVersion {
    fn read(buffer: &mut Cursor<Vec<u8>>) -> io::Result<Self> {
        Ok(ClassVersion(
            buffer.read_u16::<BigEndian>()?,
            buffer.read_u16::<BigEndian>()?,
        ))
    }
}

impl PartialOrd for ClassVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.0.cmp(&other.0) {
            Ordering::Equal => self.1.cmp(&other.1),
            x => x,
        }
    }
}

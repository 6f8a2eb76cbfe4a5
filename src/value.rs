use std::fmt::Debug;
use std::hash::Hash;
use std::io::{Read, Write};

use crate::error::CsfError;
use crate::serial;

/// Bit set in the persisted `type_id` when the payload is a multiset
/// artifact rather than a single one.
pub(crate) const MULTISET_TYPE_FLAG: u32 = 0x10;

/// Capability set a stored value type must provide: hashing and equality for
/// frequency counting, a total order for canonical symbol ordering, and a
/// canonical byte encoding for the persisted layout.
///
/// The four concrete families mirror the external dispatch surface:
/// `u32`, `u64`, fixed-width byte arrays (10 and 12) and variable-length
/// byte strings.
pub trait Value: Clone + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Value-type half of the persisted `type_id`.
    const TYPE_ID: u32;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError>;

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError>;
}

impl Value for u32 {
    const TYPE_ID: u32 = 0;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u32(writer, *self)
    }

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        serial::read_u32(reader)
    }
}

impl Value for u64 {
    const TYPE_ID: u32 = 1;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u64(writer, *self)
    }

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        serial::read_u64(reader)
    }
}

impl Value for [u8; 10] {
    const TYPE_ID: u32 = 2;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_bytes(writer, self)
    }

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Value for [u8; 12] {
    const TYPE_ID: u32 = 3;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_bytes(writer, self)
    }

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let mut buf = [0u8; 12];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Value for Vec<u8> {
    const TYPE_ID: u32 = 4;

    fn write_value<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u32(writer, self.len() as u32)?;
        serial::write_bytes(writer, self)
    }

    fn read_value<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let len = serial::read_u32(reader)? as usize;
        serial::read_vec(reader, len)
    }
}

//! Little-endian fixed-width primitives for the persisted artifact layout.

use std::io::{Read, Write};

use crate::error::CsfError;

pub(crate) fn write_u8<W: Write>(writer: &mut W, value: u8) -> Result<(), CsfError> {
    writer.write_all(&[value])?;
    Ok(())
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), CsfError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<(), CsfError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), CsfError> {
    writer.write_all(bytes)?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8, CsfError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32, CsfError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64, CsfError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, CsfError> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read `count` 64-bit words (filter fingerprint storage).
pub(crate) fn read_words<R: Read>(reader: &mut R, count: usize) -> Result<Vec<u64>, CsfError> {
    let mut words = Vec::with_capacity(count);
    let mut buf = [0u8; 8];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        words.push(u64::from_le_bytes(buf));
    }
    Ok(words)
}

/// Write 64-bit words back-to-back, little-endian.
pub(crate) fn write_words<W: Write>(writer: &mut W, words: &[u64]) -> Result<(), CsfError> {
    for word in words {
        writer.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

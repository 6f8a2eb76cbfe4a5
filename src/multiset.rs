use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::csf::Csf;
use crate::error::CsfError;
use crate::serial;
use crate::value::{MULTISET_TYPE_FLAG, Value};

/// An ordered list of per-column functions over the same key set; a query
/// returns one value per column.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MultisetCsf<V> {
    csfs: Vec<Csf<V>>,
}

impl<V: Value> MultisetCsf<V> {
    pub(crate) fn new(csfs: Vec<Csf<V>>) -> Self {
        Self { csfs }
    }

    /// Query every column in order.
    pub fn query(&self, key: &[u8]) -> Vec<V> {
        self.csfs.iter().map(|csf| csf.query(key)).collect()
    }

    /// Query columns in parallel. Columns are independent and share only
    /// read-only state, so this is safe from any number of callers.
    #[cfg(feature = "parallel")]
    pub fn par_query(&self, key: &[u8]) -> Vec<V> {
        self.csfs.par_iter().map(|csf| csf.query(key)).collect()
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.csfs.len()
    }

    #[inline]
    pub fn column(&self, index: usize) -> &Csf<V> {
        &self.csfs[index]
    }

    pub fn size_in_bytes(&self) -> usize {
        self.csfs.iter().map(Csf::size_in_bytes).sum()
    }

    /// Persist as `u32 type_id` (with the multiset flag) followed by the
    /// column count and each column's payload.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u32(writer, V::TYPE_ID | MULTISET_TYPE_FLAG)?;
        serial::write_u32(writer, self.csfs.len() as u32)?;
        for csf in &self.csfs {
            csf.write_payload(writer)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let type_id = serial::read_u32(reader)?;
        let expected = V::TYPE_ID | MULTISET_TYPE_FLAG;
        if type_id != expected {
            return Err(CsfError::Deserialization(format!(
                "expected type id {expected} but found {type_id}"
            )));
        }
        let num_columns = serial::read_u32(reader)? as usize;
        if num_columns == 0 {
            return Err(CsfError::Deserialization(
                "multiset artifact has zero columns".to_string(),
            ));
        }
        let mut csfs = Vec::with_capacity(num_columns);
        for _ in 0..num_columns {
            csfs.push(Csf::read_payload(reader)?);
        }
        Ok(Self { csfs })
    }

    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CsfError>
    where
        V: serde::Serialize,
    {
        Ok(bincode::serialize(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CsfError>
    where
        V: serde::de::DeserializeOwned,
    {
        Ok(bincode::deserialize(bytes)?)
    }
}

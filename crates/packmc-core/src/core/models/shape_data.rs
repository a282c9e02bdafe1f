use std::collections::BTreeMap;
use thiserror::Error;

/// Key-value textual form of a per-particle payload, e.g. `{"species": "2"}`.
pub type TextualShapeData = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeDataError {
    #[error("Missing shape data parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value '{value}' for shape data parameter '{name}'")]
    InvalidValue { name: String, value: String },

    #[error("Shape data has {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    #[error("Invalid shape data: {0}")]
    Invalid(String),
}

/// Opaque, fixed-size per-particle payload interpreted only by an interaction.
///
/// Every particle of one packing carries a payload of the same length. Equality is bytewise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShapeData {
    bytes: Vec<u8>,
}

impl ShapeData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_u32(value: u32) -> Self {
        Self::new(value.to_le_bytes().to_vec())
    }

    /// Reads the payload as a little-endian `u32`, if it is exactly four bytes long.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.bytes.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for ShapeData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Validates and converts per-particle payloads between their binary and textual forms.
pub trait ShapeDataManager {
    fn shape_data_size(&self) -> usize;

    fn validate_shape_data(&self, data: &ShapeData) -> Result<(), ShapeDataError> {
        if data.len() != self.shape_data_size() {
            return Err(ShapeDataError::WrongSize {
                expected: self.shape_data_size(),
                actual: data.len(),
            });
        }
        Ok(())
    }

    fn serialize_shape_data(&self, data: &ShapeData) -> Result<TextualShapeData, ShapeDataError>;

    fn deserialize_shape_data(&self, data: &TextualShapeData) -> Result<ShapeData, ShapeDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_payload_is_little_endian() {
        let data = ShapeData::from_u32(0x0102_0304);
        assert_eq!(data.as_bytes(), &[4, 3, 2, 1]);
        assert_eq!(data.as_u32(), Some(0x0102_0304));
    }

    #[test]
    fn as_u32_rejects_other_sizes() {
        assert_eq!(ShapeData::new(vec![1, 2, 3]).as_u32(), None);
        assert_eq!(ShapeData::empty().as_u32(), None);
    }

    #[test]
    fn equality_is_bytewise() {
        assert_eq!(ShapeData::from(vec![7, 8]), ShapeData::new(vec![7, 8]));
        assert_ne!(ShapeData::new(vec![7, 8]), ShapeData::new(vec![8, 7]));
        assert!(ShapeData::empty().is_empty());
    }
}

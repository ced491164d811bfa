//! Value Objects for the back-office

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used by every comma-joined multi-item column.
pub const JOIN_SEPARATOR: &str = ", ";

/// Placeholder kept in joined columns when a line has no value, so positions stay aligned.
pub const EMPTY_SLOT: &str = "-";

/// Barcode value object, the natural key of a product
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Barcode(String);

impl Barcode {
    pub fn new(value: impl Into<String>) -> Result<Self, BarcodeError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(BarcodeError::Empty); }
        if value.len() > 64 { return Err(BarcodeError::TooLong); }
        if value.contains(',') { return Err(BarcodeError::ContainsSeparator); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum BarcodeError { Empty, TooLong, ContainsSeparator }
impl std::error::Error for BarcodeError {}
impl fmt::Display for BarcodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "barcode empty"),
            Self::TooLong => write!(f, "barcode too long"),
            Self::ContainsSeparator => write!(f, "barcode contains ','"),
        }
    }
}

/// Join values into one column. Blank values become [`EMPTY_SLOT`].
pub fn join_values<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| {
            let v = v.as_ref().trim();
            if v.is_empty() { EMPTY_SLOT.to_string() } else { v.to_string() }
        })
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR)
}

/// Split a joined column back into its values.
///
/// Accepts both `", "` and a bare `","` so rows written by older tooling split the same way.
/// [`EMPTY_SLOT`] comes back as an empty string; an empty column yields no values.
pub fn split_values(joined: &str) -> Vec<String> {
    if joined.trim().is_empty() { return vec![]; }
    joined
        .split(',')
        .map(|v| {
            let v = v.trim();
            if v == EMPTY_SLOT { String::new() } else { v.to_string() }
        })
        .collect()
}

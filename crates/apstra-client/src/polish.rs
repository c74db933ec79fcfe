//! Raw vs. polished data
//!
//! Every resource has a `Raw*` type mirroring the controller's JSON exactly
//! (strings for enums, ids instead of embedded objects, positional arrays)
//! and a polished type with the same information in typed form. Raw types
//! implement [`Polish`]; request types implement [`Rawify`] to go back to the
//! wire shape. Neither direction may panic on malformed data.

use crate::error::ApstraError;
use chrono::{DateTime, Utc};

/// Translate wire data into its typed form
pub trait Polish {
    type Polished;

    fn polish(self) -> Result<Self::Polished, ApstraError>;
}

/// Translate a typed request into its wire form
pub trait Rawify {
    type Raw;

    fn raw(&self) -> Result<Self::Raw, ApstraError>;
}

impl<T: Polish> Polish for Vec<T> {
    type Polished = Vec<T::Polished>;

    fn polish(self) -> Result<Self::Polished, ApstraError> {
        self.into_iter().map(Polish::polish).collect()
    }
}

impl<T: Polish> Polish for Option<T> {
    type Polished = Option<T::Polished>;

    fn polish(self) -> Result<Self::Polished, ApstraError> {
        self.map(Polish::polish).transpose()
    }
}

/// Parse an RFC 3339 timestamp as sent by the controller
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, ApstraError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApstraError::Polish(format!("{} '{}' is not a valid timestamp: {}", field, value, e)))
}

/// Parse an optional timestamp; absent and empty strings become `None`
pub fn parse_optional_timestamp(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApstraError> {
    match value {
        None | Some("") => Ok(None),
        Some(v) => parse_timestamp(field, v).map(Some),
    }
}

/// Build a `Polish` error for an enum value the client does not know
pub fn unknown_value(kind: &str, value: &str) -> ApstraError {
    ApstraError::Polish(format!("unknown {} '{}'", kind, value))
}

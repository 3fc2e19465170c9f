use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values that can be bound as parameters or read back from a row.
///
/// ```rust
/// use sqlite_stepper::prelude::*;
///
/// let params = BindParams::positional(vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ]);
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value, stored by the engine as 0/1
    Bool(bool),
    /// Timestamp value, stored by the engine as text
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value, stored by the engine as text
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Integers 0 and 1 read back as booleans, since that is how they were stored.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(0) => Some(false),
            RowValues::Int(1) => Some(true),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        }
        let text = self.as_text()?;
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    }

    /// JSON rendering used by the command-line tool. Blobs become arrays of bytes.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%F %T%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }
}

/// A parameter set for one statement: by position or by name, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum BindParams {
    Positional(Vec<RowValues>),
    /// Keys may carry the placeholder prefix (`$id`, `:id`, `@id`) or not (`id`).
    Named(BTreeMap<String, RowValues>),
}

impl BindParams {
    /// The empty set; valid for any statement.
    #[must_use]
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    #[must_use]
    pub fn positional(values: Vec<RowValues>) -> Self {
        Self::Positional(values)
    }

    pub fn named<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RowValues)>,
    {
        Self::Named(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }
}

impl Default for BindParams {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Vec<RowValues>> for BindParams {
    fn from(values: Vec<RowValues>) -> Self {
        Self::Positional(values)
    }
}

impl From<&[RowValues]> for BindParams {
    fn from(values: &[RowValues]) -> Self {
        Self::Positional(values.to_vec())
    }
}

impl From<BTreeMap<String, RowValues>> for BindParams {
    fn from(values: BTreeMap<String, RowValues>) -> Self {
        Self::Named(values)
    }
}

/// How a statement declares its placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// No placeholders at all.
    None,
    /// `?` or `?NNN` only.
    Positional,
    /// `:name`, `@name` or `$name` only.
    Named,
    /// Both kinds in one statement; only positional binding is accepted.
    Mixed,
}

impl PlaceholderStyle {
    /// Classify the parameter names reported by the engine (`None` for a bare `?`).
    #[must_use]
    pub fn from_parameter_names(names: &[Option<String>]) -> Self {
        let mut positional = false;
        let mut named = false;
        for name in names {
            match name.as_deref() {
                None => positional = true,
                Some(n) if n.starts_with('?') => positional = true,
                Some(_) => named = true,
            }
        }
        match (positional, named) {
            (false, false) => Self::None,
            (true, false) => Self::Positional,
            (false, true) => Self::Named,
            (true, true) => Self::Mixed,
        }
    }

    /// Whether `params` may be bound to a statement of this style.
    #[must_use]
    pub fn accepts(self, params: &BindParams) -> bool {
        if params.is_empty() {
            return true;
        }
        match params {
            BindParams::Positional(_) => self != Self::Named,
            BindParams::Named(_) => self == Self::Named,
        }
    }
}

/// Outcome of one cursor advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The destination holds the next row.
    Row,
    /// No more rows. Not an error.
    EndOfRows,
}

use crate::foreign::{ForeignParams, ForeignValue};
use crate::types::{BindParams, RowValues};

/// Convert a single `RowValue` to the value the engine stores.
#[must_use]
pub fn row_value_to_foreign_value(value: &RowValues) -> ForeignValue {
    match value {
        RowValues::Int(i) => ForeignValue::Integer(*i),
        RowValues::Float(f) => ForeignValue::Real(*f),
        RowValues::Text(s) => ForeignValue::Text(s.clone()),
        RowValues::Bool(b) => ForeignValue::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => ForeignValue::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => ForeignValue::Null,
        RowValues::JSON(jval) => ForeignValue::Text(jval.to_string()),
        RowValues::Blob(bytes) => ForeignValue::Blob(bytes.clone()),
    }
}

/// Convert an engine value read from a row.
#[must_use]
pub fn foreign_value_to_row_value(value: ForeignValue) -> RowValues {
    match value {
        ForeignValue::Null => RowValues::Null,
        ForeignValue::Integer(i) => RowValues::Int(i),
        ForeignValue::Real(f) => RowValues::Float(f),
        ForeignValue::Text(s) => RowValues::Text(s),
        ForeignValue::Blob(b) => RowValues::Blob(b),
    }
}

#[must_use]
pub fn convert_row(values: Vec<ForeignValue>) -> Vec<RowValues> {
    values.into_iter().map(foreign_value_to_row_value).collect()
}

/// Convert a parameter set into the engine's binding shape, keeping its kind.
#[must_use]
pub fn convert_params(params: &BindParams) -> ForeignParams {
    match params {
        BindParams::Positional(values) => {
            ForeignParams::Positional(values.iter().map(row_value_to_foreign_value).collect())
        }
        BindParams::Named(values) => ForeignParams::Named(
            values
                .iter()
                .map(|(name, value)| (name.clone(), row_value_to_foreign_value(value)))
                .collect(),
        ),
    }
}

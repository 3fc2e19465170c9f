use std::collections::HashMap;
use std::sync::Arc;

use super::row::{Row, build_index};
use crate::types::RowValues;

/// All rows produced by one statement, materialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the statement
    pub results: Vec<Row>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        let column_index = Arc::new(build_index(&column_names));
        Self {
            results: Vec::new(),
            column_names: Arc::new(column_names),
            column_index,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append a row; values are expected in column order.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        self.results.push(Row::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Values of every row, without column names.
    #[must_use]
    pub fn values(&self) -> Vec<Vec<RowValues>> {
        self.results.iter().map(|row| row.values.clone()).collect()
    }
}

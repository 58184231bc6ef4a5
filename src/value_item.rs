// Named, block-addressed records in the form the compartment container is
// persisted. The live model is typed (see compartment_container); these records
// only exist at the persistence boundary so saved files keep their addressing.

use crate::error::{CompartmentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(String),
    Matrix(Vec<Vec<String>>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueItem {
    pub name: String,
    pub block_name: String,
    pub vertical_position: u32,
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ValueItem {
    pub fn scalar(
        name: impl Into<String>,
        block_name: impl Into<String>,
        vertical_position: u32,
        value: impl ToString,
    ) -> Self {
        Self {
            name: name.into(),
            block_name: block_name.into(),
            vertical_position,
            value: Value::Scalar(value.to_string()),
            error: None,
        }
    }

    pub fn matrix(
        name: impl Into<String>,
        block_name: impl Into<String>,
        vertical_position: u32,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            block_name: block_name.into(),
            vertical_position,
            value: Value::Matrix(rows),
            error: None,
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn scalar_value(&self) -> Result<&str> {
        match &self.value {
            Value::Scalar(s) => Ok(s),
            Value::Matrix(_) => Err(CompartmentError::malformed(format!(
                "{} is a matrix, expected a scalar",
                self.name
            ))),
        }
    }

    pub fn rows(&self) -> Result<&[Vec<String>]> {
        match &self.value {
            Value::Matrix(rows) => Ok(rows),
            Value::Scalar(_) => Err(CompartmentError::malformed(format!(
                "{} is a scalar, expected a matrix",
                self.name
            ))),
        }
    }

    pub fn rows_mut(&mut self) -> Result<&mut Vec<Vec<String>>> {
        match &mut self.value {
            Value::Matrix(rows) => Ok(rows),
            Value::Scalar(_) => Err(CompartmentError::malformed(format!(
                "{} is a scalar, expected a matrix",
                self.name
            ))),
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.value {
            Value::Matrix(rows) => rows.len(),
            Value::Scalar(_) => 0,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<&str> {
        self.rows()?
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .ok_or_else(|| {
                CompartmentError::malformed(format!("{} has no cell ({row}, {column})", self.name))
            })
    }

    pub fn parse_cell<T: std::str::FromStr>(&self, row: usize, column: usize) -> Result<T> {
        let raw = self.cell(row, column)?;
        raw.trim().parse().map_err(|_| {
            CompartmentError::malformed(format!(
                "{} cell ({row}, {column}) has unparsable value {raw:?}",
                self.name
            ))
        })
    }

    pub fn parse_scalar<T: std::str::FromStr>(&self) -> Result<T> {
        let raw = self.scalar_value()?;
        raw.trim().parse().map_err(|_| {
            CompartmentError::malformed(format!("{} has unparsable value {raw:?}", self.name))
        })
    }
}

/// Ordered record collection with name and block addressing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueItemContainer {
    items: Vec<ValueItem>,
}

impl ValueItemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record with the same name.
    pub fn insert(&mut self, item: ValueItem) {
        match self.items.iter_mut().find(|i| i.name == item.name) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ValueItem> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ValueItem> {
        self.items.iter_mut().find(|i| i.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&ValueItem> {
        self.get(name)
            .ok_or_else(|| CompartmentError::malformed(format!("missing record {name}")))
    }

    pub fn remove(&mut self, name: &str) -> Option<ValueItem> {
        let index = self.items.iter().position(|i| i.name == name)?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> &[ValueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct block names in sorted order.
    pub fn block_names(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|i| i.block_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The record of `block_name` whose name starts with `prefix`.
    pub fn item_of_block(&self, block_name: &str, prefix: &str) -> Option<&ValueItem> {
        self.items
            .iter()
            .find(|i| i.block_name == block_name && i.name.starts_with(prefix))
    }

    pub fn has_error(&self) -> bool {
        self.items.iter().any(ValueItem::has_error)
    }
}

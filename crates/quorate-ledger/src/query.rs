//! Rich queries, iterators and pages

use serde::Serialize;
use serde_json::Value;

use crate::store::KeyValue;

/// Field condition evaluated against a top-level JSON field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl FieldFilter {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            FieldFilter::Eq { field, value } => doc.get(field) == Some(value),
            FieldFilter::In { field, values } => doc
                .get(field)
                .map(|actual| values.contains(actual))
                .unwrap_or(false),
        }
    }
}

/// Selects JSON documents of one table whose fields satisfy every filter
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub table: String,
    pub filters: Vec<FieldFilter>,
}

impl Selector {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
        }
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn any_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(FieldFilter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Parse and match a stored value. Without filters every row matches;
    /// otherwise non-JSON values never do.
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        serde_json::from_slice::<Value>(bytes)
            .map(|doc| self.matches(&doc))
            .unwrap_or(false)
    }
}

/// Results of a range scan or query, in key order
///
/// Dropping the iterator releases it.
#[derive(Debug, Default)]
pub struct StateIterator {
    items: std::vec::IntoIter<KeyValue>,
}

impl StateIterator {
    pub fn new(items: Vec<KeyValue>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.items.len() > 0
    }
}

impl Iterator for StateIterator {
    type Item = KeyValue;

    fn next(&mut self) -> Option<KeyValue> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for StateIterator {}

/// Pagination bookkeeping returned alongside a page of results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMetadata {
    pub fetched_records_count: usize,
    /// Key of the last record returned; empty once the results are exhausted
    pub bookmark: String,
}

/// One page of decoded records
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Pass back to fetch the next page; empty when there is none
    pub bookmark: String,
    /// Stored records that could not be decoded
    pub skipped: usize,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.bookmark.is_empty()
    }
}

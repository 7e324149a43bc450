//! Typed records crossing the store boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Joke {
    pub id: i64,
    pub setup: String,
    pub delivery: String,
    pub category_id: i64,
    /// Name of the category `category_id` points at.
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for creating or replacing a joke. Fields are trimmed
/// and non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewJoke {
    pub category: String,
    pub setup: String,
    pub delivery: String,
}

/// How a client names a category: by store id or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CategoryRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

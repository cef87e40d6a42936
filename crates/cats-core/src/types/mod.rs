//! Cat record types

use serde::{Deserialize, Serialize};

/// A stored cat record. The `id` is assigned by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cat {
    pub id: String,
    pub name: String,
    pub color: String,
    pub age: i32,
}

impl Cat {
    pub fn from_new(id: impl Into<String>, cat: NewCat) -> Self {
        Self {
            id: id.into(),
            name: cat.name,
            color: cat.color,
            age: cat.age,
        }
    }
}

/// Write payload for create and full-replacement update.
///
/// Unknown fields, including a client-supplied `id`, are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCat {
    pub name: String,
    pub color: String,
    pub age: i32,
}

impl NewCat {
    pub fn new(name: impl Into<String>, color: impl Into<String>, age: i32) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            age,
        }
    }
}

//! Module Data Model
//!
//! Evaluated modules, their opaque exports, and the heuristic used to size
//! exports for memory-aware eviction.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};

use crate::error::ModuleError;

// == Exports ==
/// The evaluated value a module exposes.
///
/// Mirrors the shapes a script runtime hands back. Functions are opaque and
/// carried by their source text, which is all the cache needs to size them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exports {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Function {
        #[serde(rename = "$function")]
        source: String,
    },
    Array(Vec<Exports>),
    Object(BTreeMap<String, Exports>),
}

impl Exports {
    /// An empty object, the exports of a stylesheet module.
    pub fn empty_object() -> Self {
        Exports::Object(BTreeMap::new())
    }

    pub fn function(source: impl Into<String>) -> Self {
        Exports::Function {
            source: source.into(),
        }
    }

    /// Builds an object from `(name, value)` pairs.
    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Exports)>,
        S: Into<String>,
    {
        Exports::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up a named export on an object.
    pub fn get(&self, name: &str) -> Option<&Exports> {
        match self {
            Exports::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    // == Size Estimate ==
    /// Rough byte estimate of the exports.
    ///
    /// Strings count 2 bytes per UTF-16 unit plus overhead, functions count
    /// their source the same way, and containers are walked one level deep
    /// with nested containers flat-rated. Cheap and monotonic, not exact.
    pub fn estimated_size(&self) -> usize {
        match self {
            Exports::Null | Exports::Bool(_) | Exports::Number(_) => PRIMITIVE_SIZE,
            Exports::String(s) => utf16_len(s) * 2 + STRING_OVERHEAD,
            Exports::Function { source } => function_size(source),
            Exports::Array(items) => {
                OBJECT_OVERHEAD
                    + items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| field_size(&index.to_string(), item))
                        .sum::<usize>()
            }
            Exports::Object(fields) => {
                OBJECT_OVERHEAD
                    + fields
                        .iter()
                        .map(|(key, value)| field_size(key, value))
                        .sum::<usize>()
            }
        }
    }
}

impl From<serde_json::Value> for Exports {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Exports::Null,
            serde_json::Value::Bool(b) => Exports::Bool(b),
            serde_json::Value::Number(n) => Exports::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Exports::String(s),
            serde_json::Value::Array(items) => {
                Exports::Array(items.into_iter().map(Exports::from).collect())
            }
            serde_json::Value::Object(fields) => match fields.get("$function") {
                Some(serde_json::Value::String(source)) if fields.len() == 1 => {
                    Exports::function(source.clone())
                }
                _ => Exports::Object(
                    fields
                        .into_iter()
                        .map(|(k, v)| (k, Exports::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

const PRIMITIVE_SIZE: usize = 8;
const STRING_OVERHEAD: usize = 40;
const FUNCTION_OVERHEAD: usize = 100;
const OBJECT_OVERHEAD: usize = 40;
const NESTED_OBJECT_SIZE: usize = 200;

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn function_size(source: &str) -> usize {
    utf16_len(source) * 2 + FUNCTION_OVERHEAD
}

/// Key plus pointer, plus a shallow estimate of the value.
fn field_size(key: &str, value: &Exports) -> usize {
    let value_size = match value {
        Exports::String(s) => utf16_len(s) * 2,
        Exports::Function { source } => function_size(source),
        Exports::Array(_) | Exports::Object(_) => NESTED_OBJECT_SIZE,
        Exports::Null | Exports::Bool(_) | Exports::Number(_) => PRIMITIVE_SIZE,
    };
    utf16_len(key) * 2 + 8 + value_size
}

// == Module ==
/// A uniquely identified, evaluated unit of source.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Canonical id: a filesystem path or a synthetic id such as `npm://react@18`
    pub id: String,
    pub exports: Arc<Exports>,
    pub loaded: bool,
}

impl Module {
    /// A fully loaded module.
    pub fn new(id: impl Into<String>, exports: Exports) -> Self {
        Self {
            id: id.into(),
            exports: Arc::new(exports),
            loaded: true,
        }
    }

    pub fn estimated_size(&self) -> usize {
        self.exports.estimated_size()
    }
}

/// An in-progress load that any number of tasks can await.
pub type PendingModule = Shared<BoxFuture<'static, Result<Arc<Module>, ModuleError>>>;

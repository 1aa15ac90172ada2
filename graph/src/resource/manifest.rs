use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::heap::ObjRef;

/// Maximum number of characters in a shard key.
pub const SHARD_KEY_LEN: usize = 3;

/// Shard key used for objects with an empty declared name.
const EMPTY_SHARD_KEY: &str = "_";

/// Separator between a source path and a slice index.
const SLICE_SEPARATOR: char = '#';

/// Catalog of externalized objects, sharded by a normalized name prefix.
///
/// Each shard maps object identity to the catalog path the object was
/// loaded from. Serializable with serde so hosts can persist it with any
/// [`Format`](crate::Format)-style encoder.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    shards: HashMap<String, HashMap<ObjRef, String>>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `object`, declared as `name`, lives at `path`.
    pub fn insert(&mut self, name: &str, object: ObjRef, path: impl Into<String>) {
        self.shards
            .entry(shard_key(name))
            .or_default()
            .insert(object, path.into());
    }

    /// The catalog path of `object`, searched in the shard for `name`.
    pub fn lookup(&self, name: &str, object: ObjRef) -> Option<&str> {
        self.shards
            .get(&shard_key(name))?
            .get(&object)
            .map(String::as_str)
    }

    pub fn shard(&self, key: &str) -> Option<&HashMap<ObjRef, String>> {
        self.shards.get(key)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Total number of cataloged objects.
    pub fn len(&self) -> usize {
        self.shards.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.values().all(HashMap::is_empty)
    }
}

/// Normalize a declared name into its shard key: upper-cased, whitespace
/// dropped, at most [`SHARD_KEY_LEN`] characters.
pub fn shard_key(name: &str) -> String {
    let key: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .take(SHARD_KEY_LEN)
        .collect();
    if key.is_empty() {
        EMPTY_SHARD_KEY.to_owned()
    } else {
        key
    }
}

/// Path of the `index`-th resource drawn from the source asset at `path`.
pub fn make_sliced_path(path: &str, index: usize) -> String {
    format!("{path}{SLICE_SEPARATOR}{index}")
}

/// Split a sliced path into its source path and slice index.
///
/// Paths without a numeric `#<index>` suffix are returned whole.
pub fn split_sliced_path(path: &str) -> (&str, Option<usize>) {
    if let Some((base, suffix)) = path.rsplit_once(SLICE_SEPARATOR) {
        if let Ok(index) = suffix.parse::<usize>() {
            return (base, Some(index));
        }
    }
    (path, None)
}

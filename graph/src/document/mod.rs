//! The serialized document: a tree of attribute-bearing [`Node`]s.
//!
//! - [`Document`] — root node plus version/culture header
//! - [`Node`] — scalar leaf (`value` set) or composite (`children` set)
//! - [`TypeRef`] — inline descriptor, cached type id, or both
//! - [`xml`] — XML text encoding
//! - [`Format`] / [`encode`] / [`decode`] — format dispatch (RON/bincode feature-gated)
//!
//! # Null sentinel
//!
//! A null is a node whose `value` is `"null"` and which carries neither a
//! type nor an id. Every string node carries a type, so a string whose
//! text is `"null"` is never mistaken for the sentinel.

mod format;
pub(crate) mod scalar;
pub mod xml;

pub use format::{decode, encode, Format};

use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;

/// The literal written for null values.
pub const NULL_SENTINEL: &str = "null";

/// Element name of the type-cache block.
pub const TYPE_CACHE_NODE: &str = "typeCache";

/// Culture written when none is configured.
pub const INVARIANT_CULTURE: &str = "invariant";

pub const ROOT_NODE: &str = "root";
/// Top-level node holding a deferred object no owner wrote.
pub const DEFINITION_NODE: &str = "definition";
pub const ITEM_NODE: &str = "item";
pub const ENTRY_NODE: &str = "entry";
pub const KEY_NODE: &str = "key";
pub const VALUE_NODE: &str = "value";
/// Child of the type-cache block.
pub const TYPE_ENTRY_NODE: &str = "type";

/// How a node refers to its type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    /// Full descriptor, type used once.
    Inline(TypeDescriptor),
    /// Bare reference into the type cache.
    Cached(u32),
    /// Full descriptor that also defines a cache id.
    Declared { id: u32, descriptor: TypeDescriptor },
}

impl TypeRef {
    pub fn id(&self) -> Option<u32> {
        match self {
            TypeRef::Inline(_) => None,
            TypeRef::Cached(id) | TypeRef::Declared { id, .. } => Some(*id),
        }
    }

    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeRef::Inline(d) | TypeRef::Declared { descriptor: d, .. } => Some(d),
            TypeRef::Cached(_) => None,
        }
    }
}

/// One unit of the serialized tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub id: Option<u32>,
    pub ty: Option<TypeRef>,
    pub value: Option<String>,
    pub children: Vec<Node>,
    /// The first child is a [`TYPE_CACHE_NODE`] block.
    pub has_type_cache: bool,
    /// Stub whose content is written elsewhere under the same id.
    pub deferred: bool,
    pub resource_path: Option<String>,
    pub builtin_id: Option<u32>,
    /// Per-axis lengths of a multi-dimensional sequence.
    pub ranks: Option<Vec<usize>>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn null(name: impl Into<String>) -> Self {
        Self {
            value: Some(NULL_SENTINEL.to_owned()),
            ..Self::new(name)
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.as_deref() == Some(NULL_SENTINEL) && self.ty.is_none() && self.id.is_none()
    }

    /// A bare back-reference: an id and nothing else.
    pub fn is_reference(&self) -> bool {
        self.id.is_some()
            && self.ty.is_none()
            && self.value.is_none()
            && self.children.is_empty()
            && self.resource_path.is_none()
            && self.builtin_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }

    /// The first child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Children excluding a leading type-cache block.
    pub fn content(&self) -> &[Node] {
        if self.has_type_cache && !self.children.is_empty() {
            &self.children[1..]
        } else {
            &self.children
        }
    }

    /// This node and all descendants, depth-first pre-order.
    pub fn walk(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// A complete serialized graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Compatibility gate checked by the reader.
    pub version: u32,
    /// Locale used for scalar text.
    pub culture: String,
    pub root: Node,
    /// Definitions of deferred objects that no designated owner wrote.
    pub definitions: Vec<Node>,
}

impl Document {
    /// Every node in document order: the root tree, then the definitions.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = self.root.walk();
        for def in &self.definitions {
            out.extend(def.walk());
        }
        out
    }
}

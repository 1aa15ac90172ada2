//! Pluggable per-type serialization strategies.
//!
//! A [`Surrogate`] replaces the default field-by-field walk for the types
//! its [`SurrogateKey`] matches. On write it [`extract`](Surrogate::extract)s
//! named values from an object; on read it
//! [`reconstruct`](Surrogate::reconstruct)s an object from the values the
//! reader decoded.
//!
//! # Selection
//!
//! Candidates are ranked by [`Specificity`], not by registration order:
//!
//! 1. `Exact` key equal to the type
//! 2. closed `Generic` key whose arguments the type's arguments are assignable to
//! 3. open `Generic` key with the same definition
//! 4. `Family` key the type derives from, closest base first
//!
//! Registration order only breaks ties between equally specific keys, with
//! the most recent registration winning. Generic types are matched only by
//! keys built from their generic definition (or an exact key).

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::ReadError;
use crate::heap::{Heap, ObjRef, Value};
use crate::registry::TypeRegistry;

/// Named values produced by [`Surrogate::extract`].
#[derive(Default)]
pub struct Extracted {
    members: Vec<(String, ExtractedMember)>,
}

pub(crate) enum ExtractedMember {
    Value(Value),
    Text(String),
}

impl Extracted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value. References are walked by the engine like any field.
    pub fn value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.members
            .push((name.into(), ExtractedMember::Value(value.into())));
    }

    /// Add a string that does not exist as a heap object.
    pub fn text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.members
            .push((name.into(), ExtractedMember::Text(text.into())));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn into_members(self) -> Vec<(String, ExtractedMember)> {
        self.members
    }
}

/// Values decoded for a surrogate-handled node, by child name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedValues {
    values: Vec<(String, Value)>,
}

impl NamedValues {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Access to the in-flight read state handed to [`Surrogate::reconstruct`].
pub struct ReconstructScope<'a> {
    pub(crate) heap: &'a mut Heap,
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) ty: &'a TypeDescriptor,
    pub(crate) objects: &'a HashMap<u32, ObjRef>,
}

impl ReconstructScope<'_> {
    /// The type being reconstructed.
    pub fn ty(&self) -> &TypeDescriptor {
        self.ty
    }

    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut *self.heap
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    /// Allocate a default instance through the registry.
    pub fn instantiate(&mut self, ty: &TypeDescriptor) -> Result<ObjRef, ReadError> {
        self.registry.instantiate(ty, self.heap)
    }

    /// The text of a decoded string value.
    pub fn text<'v>(&'v self, value: Option<&Value>) -> Option<&'v str> {
        value.and_then(|v| self.heap.text(v))
    }

    /// An object already read in this call, by document id.
    pub fn object(&self, id: u32) -> Option<ObjRef> {
        self.objects.get(&id).copied()
    }
}

/// A per-type read/write strategy.
pub trait Surrogate: Send + Sync {
    /// Produce the named values written for `object`.
    fn extract(&self, heap: &Heap, object: ObjRef, out: &mut Extracted);

    /// Rebuild an object from decoded values.
    fn reconstruct(
        &self,
        values: NamedValues,
        scope: &mut ReconstructScope<'_>,
    ) -> Result<ObjRef, ReadError>;
}

/// Which types a surrogate applies to.
#[derive(Clone, Debug, PartialEq)]
pub enum SurrogateKey {
    /// Exactly this type.
    Exact(TypeDescriptor),
    /// This type and everything assignable to it.
    Family(TypeDescriptor),
    /// Constructions of a generic definition. `arguments: None` matches
    /// every construction.
    Generic {
        definition: String,
        module: String,
        arguments: Option<Vec<TypeDescriptor>>,
    },
}

impl SurrogateKey {
    pub fn open_generic(definition: impl Into<String>, module: impl Into<String>) -> Self {
        Self::Generic {
            definition: definition.into(),
            module: module.into(),
            arguments: None,
        }
    }

    pub fn closed_generic(ty: &TypeDescriptor) -> Self {
        Self::Generic {
            definition: ty.definition().to_owned(),
            module: ty.module.clone(),
            arguments: Some(ty.arguments()),
        }
    }

    /// How specifically this key matches `ty`, or `None` if it does not.
    pub fn specificity(&self, ty: &TypeDescriptor, registry: &TypeRegistry) -> Option<Specificity> {
        match self {
            SurrogateKey::Exact(key) => (key == ty).then_some(Specificity::Exact),
            SurrogateKey::Family(_) if ty.is_generic() => None,
            SurrogateKey::Family(base) => registry
                .inheritance_distance(ty, base)
                .map(|d| Specificity::Family(Reverse(d))),
            SurrogateKey::Generic {
                definition,
                module,
                arguments,
            } => {
                if !ty.is_generic() || ty.definition() != definition || &ty.module != module {
                    return None;
                }
                match arguments {
                    None => Some(Specificity::OpenGeneric),
                    Some(expected) => {
                        let actual = ty.arguments();
                        let assignable = actual.len() == expected.len()
                            && actual
                                .iter()
                                .zip(expected)
                                .all(|(a, e)| registry.is_assignable(a, e));
                        assignable.then_some(Specificity::ClosedGeneric)
                    }
                }
            }
        }
    }
}

/// Match strength of a [`SurrogateKey`]. Larger is more specific.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    /// Base-type match; a smaller inheritance distance ranks higher.
    Family(Reverse<usize>),
    OpenGeneric,
    ClosedGeneric,
    Exact,
}

struct SurrogateEntry {
    key: SurrogateKey,
    strategy: Arc<dyn Surrogate>,
}

/// An ordered set of `(key, strategy)` pairs.
///
/// Used both for the library's permanent defaults (built once, shared
/// read-only) and for per-call overrides carried by a
/// [`SerializationContext`](crate::SerializationContext).
#[derive(Default)]
pub struct SurrogateRegistry {
    entries: Vec<SurrogateEntry>,
}

impl SurrogateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: SurrogateKey, strategy: impl Surrogate + 'static) {
        self.register_arc(key, Arc::new(strategy));
    }

    pub fn register_arc(&mut self, key: SurrogateKey, strategy: Arc<dyn Surrogate>) {
        self.entries.push(SurrogateEntry { key, strategy });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most specific strategy for `ty`, with its rank.
    pub fn best_match(
        &self,
        ty: &TypeDescriptor,
        registry: &TypeRegistry,
    ) -> Option<(Specificity, Arc<dyn Surrogate>)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(seq, e)| e.key.specificity(ty, registry).map(|s| (s, seq, e)))
            .max_by_key(|(s, seq, _)| (*s, *seq))
            .map(|(s, _, e)| (s, e.strategy.clone()))
    }
}

/// Fallback consulted when no registered key matches.
pub trait SurrogateSelector: Send + Sync {
    fn select(&self, ty: &TypeDescriptor, registry: &TypeRegistry) -> Option<Arc<dyn Surrogate>>;
}

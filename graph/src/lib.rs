//! # RedLilium Graph
//!
//! Identity-preserving serialization of arbitrary, possibly cyclic object
//! graphs into attribute-bearing documents, and back.
//!
//! ## Object model
//!
//! - [`Heap`] / [`ObjRef`] — arena of objects addressed by opaque handles
//! - [`Value`] / [`Body`] / [`Slot`] — slot values, object contents, slot addresses
//! - [`TypeDescriptor`] — `(name, module)` pair written into documents
//!
//! ## Schemas & strategies
//!
//! - [`TypeRegistry`] — registered [`TypeSchema`]s and the cached field walk
//! - [`Reflect`] — compile-time schema, derivable with `#[derive(Reflect)]`
//! - [`SurrogateRegistry`] / [`Surrogate`] — per-type write/read overrides,
//!   ranked by [`Specificity`]
//! - [`OwnershipPolicy`] — structural containment for the ownership boundary
//!   and deferred writes
//! - [`ResourceExternalizer`] — catalog paths and builtins instead of inline content
//!
//! ## Serialization
//!
//! - [`SerializationContext`] — everything one call needs, built per call
//! - [`GraphWriter`] — graph → [`Document`]
//! - [`GraphReader`] — [`Document`] → graph, with a finalization pass for
//!   deferred references
//! - [`xml`] / [`encode`] / [`decode`] — document encodings
//!
//! See `DESIGN.md` in the repository root for architecture decisions.

// `#[derive(Reflect)]` expands to `redlilium_graph::` paths, also in this crate.
extern crate self as redlilium_graph;

mod context;
mod descriptor;
pub mod document;
mod error;
mod heap;
pub mod ownership;
mod reader;
pub mod registry;
pub mod resource;
pub mod surrogate;
mod writer;

pub use context::{Activator, SerializationContext, WriteOptions};
pub use descriptor::{TypeDescriptor, CORE_MODULE};
pub use document::{decode, encode, xml, Document, Format, Node, TypeRef};
pub use error::{ReadError, ReadWarning, WriteError};
pub use graph_macro::Reflect;
pub use heap::{Body, Heap, ObjRef, Object, Slot, Value};
pub use ownership::{FieldOwnership, OwnershipDomain, OwnershipPolicy};
pub use reader::GraphReader;
pub use registry::{
    FieldDescriptor, FieldKind, MemberDecl, MemberMode, Reflect, Shape, TypeRegistry, TypeSchema,
    Visibility, STD_MODULE,
};
pub use resource::{
    ExternalRef, Manifest, MemoryResources, ResourceExternalizer, ResourceLoader,
};
pub use surrogate::{
    Extracted, NamedValues, ReconstructScope, Specificity, Surrogate, SurrogateKey,
    SurrogateRegistry, SurrogateSelector,
};
pub use writer::GraphWriter;

//! Error and warning types for graph serialization.
//!
//! Structural problems ([`ReadError::VersionUnsupported`],
//! [`ReadError::Malformed`]) abort a call. Per-field problems are isolated:
//! the reader records a [`ReadWarning`], logs it, leaves the slot unset and
//! keeps going.

use thiserror::Error;

use crate::descriptor::TypeDescriptor;
use crate::heap::{ObjRef, Slot};

/// Errors that can occur while writing a graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error("dangling object handle {0}")]
    DanglingHandle(ObjRef),
    #[error("format error: {0}")]
    Format(String),
}

/// Errors that can occur while reading a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("document version {found} is newer than the supported version {max}")]
    VersionUnsupported { found: u32, max: u32 },
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("cannot resolve type '{0}'")]
    UnresolvableType(String),
    #[error("type '{0}' has no default construction and no override is registered")]
    NoDefaultConstruction(TypeDescriptor),
    #[error("surrogate failed: {0}")]
    Surrogate(String),
    #[error("format error: {0}")]
    Format(String),
}

impl ReadError {
    /// Whether this error only affects the slot being read.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnresolvableType(_) | Self::NoDefaultConstruction(_) | Self::Surrogate(_)
        )
    }
}

/// A recoverable problem found while reading. The affected slot is left
/// null or default and reading continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadWarning {
    #[error("cannot resolve type '{ty}' at '{node}'")]
    UnresolvableType { node: String, ty: String },
    #[error("cannot construct '{ty}' at '{node}'")]
    NoDefaultConstruction { node: String, ty: TypeDescriptor },
    #[error("deferred reference {id} never resolved ({} pending slot(s))", slots.len())]
    UnresolvedDeferredReference { id: u32, slots: Vec<(ObjRef, Slot)> },
    #[error("cannot resolve resource '{0}'")]
    UnresolvedResource(String),
    #[error("surrogate for '{ty}' failed: {message}")]
    SurrogateFailed { ty: TypeDescriptor, message: String },
    #[error("cannot parse scalar '{text}' as {ty}")]
    BadScalar { text: String, ty: TypeDescriptor },
    #[error("'{node}' refers to id {id} that was never read")]
    UnresolvedReference { node: String, id: u32 },
    #[error("map key in '{node}' waits for id {id}, entry skipped")]
    PendingMapKey { node: String, id: u32 },
    #[error("cannot assign deferred id {id} to {object}{slot}")]
    UnassignableSlot { id: u32, object: ObjRef, slot: Slot },
}

//! Externalized resources: objects written as a catalog reference instead
//! of inline content.
//!
//! - [`ResourceExternalizer`] — decides on write, resolves on read
//! - [`Manifest`] — sharded `(object → path)` catalog
//! - [`ResourceLoader`] — host asset-loader boundary, with [`MemoryResources`]
//!
//! On write, an object of an externalizable type is checked against the
//! builtin list (by declared name) and then against the manifest. On read,
//! a `#<index>` suffix loads every sibling at the source path and picks
//! one by index.

mod loader;
mod manifest;

pub use loader::{MemoryResources, ResourceLoader, RESOURCE_NAME_FIELD};
pub use manifest::{make_sliced_path, shard_key, split_sliced_path, Manifest, SHARD_KEY_LEN};

use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::heap::{Heap, ObjRef};

/// How an externalized object is referenced from the document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalRef {
    /// Index into the builtin list.
    Builtin(u32),
    /// Catalog path, optionally with a `#<index>` slice suffix.
    Path(String),
}

/// First-chance intercept for externalizable leaf types.
pub struct ResourceExternalizer {
    types: HashSet<TypeDescriptor>,
    name_field: String,
    builtins: Vec<String>,
    manifest: Manifest,
    loader: Arc<dyn ResourceLoader>,
}

impl ResourceExternalizer {
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        Self {
            types: HashSet::new(),
            name_field: RESOURCE_NAME_FIELD.to_owned(),
            builtins: Vec::new(),
            manifest: Manifest::new(),
            loader,
        }
    }

    /// Mark `ty` as externalizable.
    pub fn with_type(mut self, ty: TypeDescriptor) -> Self {
        self.types.insert(ty);
        self
    }

    /// Record field holding an object's declared name. Defaults to `name`.
    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = field.into();
        self
    }

    /// Append a builtin resource name. Builtins are referenced by position.
    pub fn with_builtin(mut self, name: impl Into<String>) -> Self {
        self.builtins.push(name.into());
        self
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    pub fn is_externalizable(&self, ty: &TypeDescriptor) -> bool {
        self.types.contains(ty)
    }

    fn declared_name<'h>(&self, heap: &'h Heap, object: ObjRef) -> Option<&'h str> {
        heap.text(heap.field(object, &self.name_field)?)
    }

    /// The external reference for `object`, if it is cataloged.
    pub fn try_externalize(&self, heap: &Heap, object: ObjRef) -> Option<ExternalRef> {
        let ty = &heap.get(object)?.ty;
        if !self.is_externalizable(ty) {
            return None;
        }
        let name = self.declared_name(heap, object).unwrap_or_default();
        if let Some(index) = self.builtins.iter().position(|b| b == name) {
            return Some(ExternalRef::Builtin(index as u32));
        }
        self.manifest
            .lookup(name, object)
            .map(|path| ExternalRef::Path(path.to_owned()))
    }

    /// Load the object an external reference denotes.
    pub fn resolve(
        &self,
        reference: &ExternalRef,
        expected: &TypeDescriptor,
        heap: &mut Heap,
    ) -> Option<ObjRef> {
        match reference {
            ExternalRef::Builtin(index) => {
                let name = self.builtins.get(*index as usize)?;
                self.loader.load_builtin(name, expected, heap)
            }
            ExternalRef::Path(path) => match split_sliced_path(path) {
                (source, Some(index)) => self
                    .loader
                    .load_all(source, expected, heap)
                    .get(index)
                    .copied(),
                (_, None) => self.loader.load(path, expected, heap),
            },
        }
    }
}

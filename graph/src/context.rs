//! The per-call serialization context.
//!
//! A [`SerializationContext`] bundles everything one write or read needs:
//! the type registry, the permanent surrogates, per-call surrogate and
//! construction overrides, and the optional collaborators (resource
//! externalizer, ownership policy, fallback selector). It is built once per
//! top-level call and passed by reference through every step, so concurrent
//! calls never share mutable state.
//!
//! ```
//! use redlilium_graph::{Heap, SerializationContext, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let ctx = SerializationContext::new(&registry);
//!
//! let mut heap = Heap::new();
//! let text = heap.alloc_text("hello");
//! let doc = ctx.write(&heap, &Value::Ref(text)).unwrap();
//!
//! let mut out = Heap::new();
//! let value = ctx.read(&doc, 1, &mut out).unwrap();
//! assert_eq!(out.text(&value), Some("hello"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::document::{xml, Document, INVARIANT_CULTURE};
use crate::error::{ReadError, WriteError};
use crate::heap::{Heap, ObjRef, Value};
use crate::ownership::OwnershipPolicy;
use crate::reader::GraphReader;
use crate::registry::TypeRegistry;
use crate::resource::ResourceExternalizer;
use crate::surrogate::{Surrogate, SurrogateKey, SurrogateRegistry, SurrogateSelector};
use crate::writer::GraphWriter;

/// Default-construction override for one type.
pub type Activator = Arc<dyn Fn(&mut Heap) -> ObjRef + Send + Sync>;

/// Document header and layout options used by the writer.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteOptions {
    /// Version stamped into the document header.
    pub version: u32,
    /// Culture stamped into the header; decides the decimal separator.
    pub culture: String,
    /// Move every multi-use type descriptor into a root type-cache block.
    pub hoist_type_cache: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            version: 1,
            culture: INVARIANT_CULTURE.to_owned(),
            hoist_type_cache: false,
        }
    }
}

/// Everything one top-level write or read call needs.
pub struct SerializationContext<'a> {
    registry: &'a TypeRegistry,
    surrogates: Option<&'a SurrogateRegistry>,
    transient: SurrogateRegistry,
    activators: HashMap<TypeDescriptor, Activator>,
    selector: Option<&'a dyn SurrogateSelector>,
    externalizer: Option<&'a ResourceExternalizer>,
    ownership: Option<&'a dyn OwnershipPolicy>,
    options: WriteOptions,
}

impl<'a> SerializationContext<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            surrogates: None,
            transient: SurrogateRegistry::new(),
            activators: HashMap::new(),
            selector: None,
            externalizer: None,
            ownership: None,
            options: WriteOptions::default(),
        }
    }

    /// Use a shared, permanent surrogate set.
    pub fn with_surrogates(mut self, surrogates: &'a SurrogateRegistry) -> Self {
        self.surrogates = Some(surrogates);
        self
    }

    /// Add a surrogate that applies to this context only. Transient
    /// surrogates are consulted before the permanent set.
    pub fn with_transient_surrogate(
        mut self,
        key: SurrogateKey,
        strategy: impl Surrogate + 'static,
    ) -> Self {
        self.transient.register(key, strategy);
        self
    }

    /// Override default construction of `ty` for this context.
    pub fn with_activator(
        mut self,
        ty: TypeDescriptor,
        activator: impl Fn(&mut Heap) -> ObjRef + Send + Sync + 'static,
    ) -> Self {
        self.activators.insert(ty, Arc::new(activator));
        self
    }

    /// Fallback consulted when no surrogate key matches.
    pub fn with_selector(mut self, selector: &'a dyn SurrogateSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_externalizer(mut self, externalizer: &'a ResourceExternalizer) -> Self {
        self.externalizer = Some(externalizer);
        self
    }

    /// Enable the ownership boundary and deferred writes.
    pub fn with_ownership(mut self, policy: &'a dyn OwnershipPolicy) -> Self {
        self.ownership = Some(policy);
        self
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn externalizer(&self) -> Option<&'a ResourceExternalizer> {
        self.externalizer
    }

    pub fn ownership(&self) -> Option<&'a dyn OwnershipPolicy> {
        self.ownership
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// The strategy for `ty`: best transient match, else best permanent
    /// match, else the selector.
    pub fn surrogate_for(&self, ty: &TypeDescriptor) -> Option<Arc<dyn Surrogate>> {
        if let Some((_, strategy)) = self.transient.best_match(ty, self.registry) {
            return Some(strategy);
        }
        if let Some((_, strategy)) = self
            .surrogates
            .and_then(|s| s.best_match(ty, self.registry))
        {
            return Some(strategy);
        }
        self.selector.and_then(|s| s.select(ty, self.registry))
    }

    pub fn activator_for(&self, ty: &TypeDescriptor) -> Option<&Activator> {
        self.activators.get(ty)
    }

    /// Write the graph rooted at `root`.
    pub fn write(&self, heap: &Heap, root: &Value) -> Result<Document, WriteError> {
        GraphWriter::new(self).write(heap, root)
    }

    /// Read a document into `heap`. Warnings are logged and dropped; use a
    /// [`GraphReader`] to inspect them.
    pub fn read(
        &self,
        document: &Document,
        max_supported_version: u32,
        heap: &mut Heap,
    ) -> Result<Value, ReadError> {
        GraphReader::new(self).read(document, max_supported_version, heap)
    }

    pub fn write_xml(&self, heap: &Heap, root: &Value) -> Result<String, WriteError> {
        Ok(xml::to_xml(&self.write(heap, root)?))
    }

    pub fn read_xml(
        &self,
        text: &str,
        max_supported_version: u32,
        heap: &mut Heap,
    ) -> Result<Value, ReadError> {
        self.read(&xml::from_xml(text)?, max_supported_version, heap)
    }
}

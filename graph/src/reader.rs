//! [`Document`] → graph reconstruction.
//!
//! One forward, depth-first pass over the document followed by a
//! finalization pass:
//!
//! 1. null sentinel → null;
//! 2. an id already read → the existing object;
//! 3. type from the inline descriptor or the type cache;
//! 4. scalars and enums from their literal text;
//! 5. `ResourcePath` / `BuiltinId` → the resource externalizer;
//! 6. a matching surrogate → `reconstruct` from the decoded children;
//! 7. otherwise a default instance (or activator override), registered under
//!    its id *before* its children are read so cycles resolve through step 2.
//!
//! A `defered` child, or a bare reference to an id not read yet, registers a
//! pending patch for its slot. Once the whole document is consumed every
//! pending slot is assigned the object its id resolved to.
//!
//! Only structural problems abort a read. Everything else becomes a
//! [`ReadWarning`], the slot stays null or default, and reading continues.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::context::SerializationContext;
use crate::descriptor::TypeDescriptor;
use crate::document::scalar::{decimal_separator, parse_scalar};
use crate::document::{Document, Node, TypeRef, KEY_NODE, TYPE_CACHE_NODE, VALUE_NODE};
use crate::error::{ReadError, ReadWarning};
use crate::heap::{Body, Heap, ObjRef, Slot, Value};
use crate::registry::Shape;
use crate::resource::ExternalRef;
use crate::surrogate::{NamedValues, ReconstructScope, Surrogate};

/// Reads [`Document`]s back into a [`Heap`].
pub struct GraphReader<'c> {
    ctx: &'c SerializationContext<'c>,
    warnings: Vec<ReadWarning>,
}

impl<'c> GraphReader<'c> {
    pub fn new(ctx: &'c SerializationContext<'c>) -> Self {
        Self {
            ctx,
            warnings: Vec::new(),
        }
    }

    /// Read `document` into `heap` and return the root value.
    ///
    /// Fails with [`ReadError::VersionUnsupported`] before touching `heap`
    /// when the document is newer than `max_supported_version`.
    pub fn read(
        &mut self,
        document: &Document,
        max_supported_version: u32,
        heap: &mut Heap,
    ) -> Result<Value, ReadError> {
        if document.version > max_supported_version {
            return Err(ReadError::VersionUnsupported {
                found: document.version,
                max: max_supported_version,
            });
        }
        self.warnings.clear();

        let mut pass = ReadPass::new(self.ctx, heap, &document.culture);
        pass.scan_type_declarations(document);
        let result = pass.read_document(document);
        self.warnings = pass.warnings;
        let root = result?;

        log::debug!(
            "read document v{} into {} object(s), {} warning(s)",
            document.version,
            heap.len(),
            self.warnings.len()
        );
        Ok(root)
    }

    /// Read `document` and move its root record's fields into `target`.
    ///
    /// `target` is only modified after the whole read succeeded. References
    /// to the root inside the document are redirected to `target`.
    pub fn read_into(
        &mut self,
        document: &Document,
        max_supported_version: u32,
        heap: &mut Heap,
        target: ObjRef,
    ) -> Result<(), ReadError> {
        let start = heap.len();
        let root = self.read(document, max_supported_version, heap)?;
        let Some(root) = root.as_ref() else {
            return Err(ReadError::Malformed("root is not an object".into()));
        };
        let fields = match heap.get(root).map(|o| &o.body) {
            Some(Body::Record(fields)) => fields.clone(),
            _ => return Err(ReadError::Malformed("root is not a record".into())),
        };
        if !matches!(heap.get(target).map(|o| &o.body), Some(Body::Record(_))) {
            return Err(ReadError::Malformed(format!("target {target} is not a record")));
        }
        heap.retarget(start, root, target);
        for (name, value) in fields {
            let value = if value == Value::Ref(root) {
                Value::Ref(target)
            } else {
                value
            };
            heap.set_field(target, &name, value);
        }
        heap.destroy(root);
        Ok(())
    }

    /// Recoverable problems found by the last read.
    pub fn warnings(&self) -> &[ReadWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<ReadWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A child value, or the id it is waiting for.
enum Slotted {
    Ready(Value),
    Pending(u32),
}

/// State of one read call.
struct ReadPass<'r> {
    ctx: &'r SerializationContext<'r>,
    heap: &'r mut Heap,
    separator: char,
    objects: HashMap<u32, ObjRef>,
    types: HashMap<u32, TypeDescriptor>,
    patches: BTreeMap<u32, Vec<(ObjRef, Slot)>>,
    resources: HashMap<ExternalRef, ObjRef>,
    warnings: Vec<ReadWarning>,
}

impl<'r> ReadPass<'r> {
    fn new(ctx: &'r SerializationContext<'r>, heap: &'r mut Heap, culture: &str) -> Self {
        Self {
            ctx,
            heap,
            separator: decimal_separator(culture),
            objects: HashMap::new(),
            types: HashMap::new(),
            patches: BTreeMap::new(),
            resources: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Collect every type declaration up front, so a cached type id still
    /// resolves when the subtree declaring it is skipped.
    fn scan_type_declarations(&mut self, document: &Document) {
        for node in document.nodes() {
            if let Some(TypeRef::Declared { id, descriptor }) = &node.ty {
                self.types.insert(*id, descriptor.clone());
            }
        }
    }

    fn read_document(&mut self, document: &Document) -> Result<Value, ReadError> {
        let root = self.read_node(&document.root)?;
        for definition in &document.definitions {
            self.read_node(definition)?;
        }
        self.finalize();
        Ok(root)
    }

    fn warn(&mut self, warning: ReadWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Turn a recoverable error into a warning and a null value.
    fn recover(&mut self, node: &Node, error: ReadError) -> Result<Value, ReadError> {
        let warning = match error {
            ReadError::UnresolvableType(ty) => ReadWarning::UnresolvableType {
                node: node.name.clone(),
                ty,
            },
            ReadError::NoDefaultConstruction(ty) => ReadWarning::NoDefaultConstruction {
                node: node.name.clone(),
                ty,
            },
            other => return Err(other),
        };
        self.warn(warning);
        Ok(Value::Null)
    }

    fn register(&mut self, node: &Node, object: ObjRef) {
        if let Some(id) = node.id {
            self.objects.insert(id, object);
        }
    }

    fn add_patch(&mut self, id: u32, object: ObjRef, slot: Slot) {
        log::trace!("pending id {id} for {object}{slot}");
        self.patches.entry(id).or_default().push((object, slot));
    }

    fn read_child(&mut self, node: &Node) -> Result<Slotted, ReadError> {
        if let Some(id) = node.id {
            if node.deferred || node.is_reference() {
                return Ok(match self.objects.get(&id) {
                    Some(object) => Slotted::Ready(Value::Ref(*object)),
                    None => Slotted::Pending(id),
                });
            }
        }
        Ok(Slotted::Ready(self.read_node(node)?))
    }

    fn resolve_type(&mut self, node: &Node) -> Result<TypeDescriptor, ReadError> {
        match &node.ty {
            Some(TypeRef::Inline(descriptor)) => Ok(descriptor.clone()),
            Some(TypeRef::Declared { id, descriptor }) => {
                self.types.insert(*id, descriptor.clone());
                Ok(descriptor.clone())
            }
            Some(TypeRef::Cached(id)) => self
                .types
                .get(id)
                .cloned()
                .ok_or_else(|| ReadError::UnresolvableType(format!("typeid {id}"))),
            None => Err(ReadError::UnresolvableType(format!(
                "untyped node '{}'",
                node.name
            ))),
        }
    }

    fn read_node(&mut self, node: &Node) -> Result<Value, ReadError> {
        if node.is_null() {
            return Ok(Value::Null);
        }
        if let Some(object) = node.id.and_then(|id| self.objects.get(&id)) {
            return Ok(Value::Ref(*object));
        }
        if node.is_reference() || node.deferred {
            // Only reachable outside a slot (root or definition).
            if let Some(id) = node.id {
                self.warn(ReadWarning::UnresolvedReference {
                    node: node.name.clone(),
                    id,
                });
            }
            return Ok(Value::Null);
        }
        if node.has_type_cache
            && node.children.first().map(|c| c.name.as_str()) != Some(TYPE_CACHE_NODE)
        {
            return Err(ReadError::Malformed(format!(
                "'{}' declares a type cache but has no {TYPE_CACHE_NODE} block",
                node.name
            )));
        }

        let ty = match self.resolve_type(node) {
            Ok(ty) => ty,
            Err(error) => return self.recover(node, error),
        };
        log::trace!("{}: reading '{ty}'", node.name);

        if ty.is_core_scalar() {
            return Ok(self.read_scalar(node, ty));
        }
        let schema = self.ctx.registry().schema(&ty);
        if let Some(Shape::Enum(_)) = schema.as_ref().map(|s| &s.shape) {
            return Ok(self.read_enum(node, ty));
        }
        if node.resource_path.is_some() || node.builtin_id.is_some() {
            return Ok(self.read_resource(node, &ty));
        }
        if let Some(surrogate) = self.ctx.surrogate_for(&ty) {
            return self.read_with_surrogate(node, ty, surrogate);
        }
        if ty == TypeDescriptor::string() {
            let text = self.heap.alloc_text(node.value.clone().unwrap_or_default());
            self.register(node, text);
            return Ok(Value::Ref(text));
        }
        self.read_composite(node, ty)
    }

    fn read_scalar(&mut self, node: &Node, ty: TypeDescriptor) -> Value {
        let text = node.value.as_deref().unwrap_or_default();
        match parse_scalar(&ty, text, self.separator) {
            Some(value) => value,
            None => {
                self.warn(ReadWarning::BadScalar {
                    text: text.to_owned(),
                    ty,
                });
                Value::Null
            }
        }
    }

    fn read_enum(&mut self, node: &Node, ty: TypeDescriptor) -> Value {
        let text = node.value.as_deref().unwrap_or_default();
        match text.trim().parse::<i64>() {
            Ok(ordinal) => Value::Enum { ty, ordinal },
            Err(_) => {
                self.warn(ReadWarning::BadScalar {
                    text: text.to_owned(),
                    ty,
                });
                Value::Null
            }
        }
    }

    fn read_resource(&mut self, node: &Node, ty: &TypeDescriptor) -> Value {
        let reference = match (node.builtin_id, &node.resource_path) {
            (Some(index), _) => ExternalRef::Builtin(index),
            (None, Some(path)) => ExternalRef::Path(path.clone()),
            (None, None) => return Value::Null,
        };
        let resolved = match self.resources.get(&reference) {
            Some(object) => Some(*object),
            None => match self.ctx.externalizer() {
                Some(externalizer) => externalizer.resolve(&reference, ty, self.heap),
                None => None,
            },
        };
        match resolved {
            Some(object) => {
                self.resources.insert(reference, object);
                self.register(node, object);
                Value::Ref(object)
            }
            None => {
                let described = match &reference {
                    ExternalRef::Builtin(index) => format!("builtin {index} ({ty})"),
                    ExternalRef::Path(path) => format!("{path} ({ty})"),
                };
                self.warn(ReadWarning::UnresolvedResource(described));
                Value::Null
            }
        }
    }

    fn read_with_surrogate(
        &mut self,
        node: &Node,
        ty: TypeDescriptor,
        surrogate: Arc<dyn Surrogate>,
    ) -> Result<Value, ReadError> {
        let mut values = Vec::new();
        let mut pending = Vec::new();
        for child in node.content() {
            match self.read_child(child)? {
                Slotted::Ready(value) => values.push((child.name.clone(), value)),
                Slotted::Pending(id) => {
                    values.push((child.name.clone(), Value::Null));
                    pending.push((id, child.name.clone()));
                }
            }
        }

        let mut scope = ReconstructScope {
            heap: &mut *self.heap,
            registry: self.ctx.registry(),
            ty: &ty,
            objects: &self.objects,
        };
        match surrogate.reconstruct(NamedValues::new(values), &mut scope) {
            Ok(object) => {
                self.register(node, object);
                for (id, name) in pending {
                    self.add_patch(id, object, Slot::Field(name));
                }
                Ok(Value::Ref(object))
            }
            Err(error) if error.is_recoverable() => {
                self.warn(ReadWarning::SurrogateFailed {
                    ty,
                    message: error.to_string(),
                });
                Ok(Value::Null)
            }
            Err(error) => Err(error),
        }
    }

    fn read_composite(&mut self, node: &Node, ty: TypeDescriptor) -> Result<Value, ReadError> {
        let object = match self.ctx.activator_for(&ty) {
            Some(activator) => activator(self.heap),
            None => match self.ctx.registry().instantiate(&ty, self.heap) {
                Ok(object) => object,
                Err(error) => return self.recover(node, error),
            },
        };
        self.register(node, object);

        let body = self.heap.get(object).map(|o| match &o.body {
            Body::Record(_) => BodyKind::Record,
            Body::Sequence { .. } => BodyKind::Sequence,
            Body::Map(_) => BodyKind::Map,
            Body::Text(_) => BodyKind::Text,
        });
        match body {
            Some(BodyKind::Record) => self.read_record(node, &ty, object)?,
            Some(BodyKind::Sequence) => self.read_sequence(node, object)?,
            Some(BodyKind::Map) => self.read_map(node, object)?,
            Some(BodyKind::Text) => {
                if let Some(Body::Text(text)) = self.heap.get_mut(object).map(|o| &mut o.body) {
                    *text = node.value.clone().unwrap_or_default();
                }
            }
            None => {
                return Err(ReadError::Malformed(format!(
                    "activator for '{ty}' returned a dangling handle"
                )));
            }
        }
        Ok(Value::Ref(object))
    }

    fn read_record(
        &mut self,
        node: &Node,
        ty: &TypeDescriptor,
        object: ObjRef,
    ) -> Result<(), ReadError> {
        let members = self.ctx.registry().members_of(ty);
        for child in node.content() {
            let known = members.iter().any(|m| m.name == child.name)
                || self.heap.field(object, &child.name).is_some();
            if !known {
                log::debug!("'{ty}' has no member '{}', skipped", child.name);
                continue;
            }
            match self.read_child(child)? {
                Slotted::Ready(value) => {
                    self.heap.set_field(object, &child.name, value);
                }
                Slotted::Pending(id) => self.add_patch(id, object, Slot::Field(child.name.clone())),
            }
        }
        Ok(())
    }

    fn read_sequence(&mut self, node: &Node, object: ObjRef) -> Result<(), ReadError> {
        let children = node.content();
        let ranks = node.ranks.clone().unwrap_or_else(|| vec![children.len()]);
        let total = ranks.iter().try_fold(1usize, |acc, rank| acc.checked_mul(*rank));
        if total != Some(children.len()) {
            return Err(ReadError::Malformed(format!(
                "'{}' has {} item(s) but ranks {ranks:?}",
                node.name,
                children.len()
            )));
        }
        if let Some(obj) = self.heap.get_mut(object) {
            obj.body = Body::Sequence {
                ranks,
                items: vec![Value::Null; children.len()],
            };
        }
        for (index, child) in children.iter().enumerate() {
            match self.read_child(child)? {
                Slotted::Ready(value) => {
                    self.heap.set_index(object, index, value);
                }
                Slotted::Pending(id) => self.add_patch(id, object, Slot::Index(index)),
            }
        }
        Ok(())
    }

    fn read_map(&mut self, node: &Node, object: ObjRef) -> Result<(), ReadError> {
        for entry in node.content() {
            let (Some(key), Some(value)) = (entry.child(KEY_NODE), entry.child(VALUE_NODE)) else {
                return Err(ReadError::Malformed(format!(
                    "map entry in '{}' needs {KEY_NODE} and {VALUE_NODE}",
                    node.name
                )));
            };
            let key = match self.read_child(key)? {
                Slotted::Ready(key) => key,
                Slotted::Pending(id) => {
                    self.warn(ReadWarning::PendingMapKey {
                        node: node.name.clone(),
                        id,
                    });
                    continue;
                }
            };
            self.heap.set_key(object, key.clone(), Value::Null);
            match self.read_child(value)? {
                Slotted::Ready(value) => {
                    self.heap.set_key(object, key, value);
                }
                Slotted::Pending(id) => self.add_patch(id, object, Slot::Key(key)),
            }
        }
        Ok(())
    }

    /// Assign every pending slot. One warning per id that never resolved.
    fn finalize(&mut self) {
        for (id, slots) in std::mem::take(&mut self.patches) {
            let Some(target) = self.objects.get(&id).copied() else {
                self.warn(ReadWarning::UnresolvedDeferredReference { id, slots });
                continue;
            };
            for (object, slot) in slots {
                if !self.heap.assign(object, &slot, Value::Ref(target)) {
                    self.warn(ReadWarning::UnassignableSlot { id, object, slot });
                }
            }
        }
    }
}

enum BodyKind {
    Record,
    Sequence,
    Map,
    Text,
}

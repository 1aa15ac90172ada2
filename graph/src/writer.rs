//! Graph → [`Document`] conversion.
//!
//! The writer walks the graph depth-first from the root and builds nodes
//! into an index arena. Because every node stays addressable until the walk
//! ends, the retroactive edits the format requires are O(1):
//!
//! - **Object dedup.** The first visit of an object writes its content
//!   without an id. A second visit assigns the next id, stamps it onto the
//!   first node and emits a bare back-reference carrying only that id.
//! - **Type dedup.** The first use of a descriptor is written inline. A
//!   second use assigns a type id, turns the first node's descriptor into a
//!   declaration, and every later use carries only the id.
//!
//! Objects are registered before their contents are walked, so cycles end
//! in a back-reference instead of unbounded recursion.
//!
//! With an [`OwnershipPolicy`](crate::OwnershipPolicy) the writer also
//! enforces the ownership boundary (out-of-domain bounded objects become
//! null) and the deferred-write rule (objects reached outside their
//! designated owner become `defered` stubs). Every stub id gets exactly one
//! real definition: either the owner writes it during the walk, or it is
//! appended to [`Document::definitions`] afterwards.

use std::collections::HashMap;

use crate::context::SerializationContext;
use crate::descriptor::TypeDescriptor;
use crate::document::scalar::{decimal_separator, format_scalar};
use crate::document::{
    Document, Node, TypeRef, DEFINITION_NODE, ENTRY_NODE, ITEM_NODE, KEY_NODE, ROOT_NODE,
    TYPE_CACHE_NODE, TYPE_ENTRY_NODE, VALUE_NODE,
};
use crate::error::WriteError;
use crate::heap::{Body, Heap, ObjRef, Value};
use crate::ownership::OwnershipDomain;
use crate::resource::ExternalRef;
use crate::surrogate::{Extracted, ExtractedMember};

/// Writes object graphs into [`Document`]s.
pub struct GraphWriter<'c> {
    ctx: &'c SerializationContext<'c>,
}

impl<'c> GraphWriter<'c> {
    pub fn new(ctx: &'c SerializationContext<'c>) -> Self {
        Self { ctx }
    }

    /// Write the graph rooted at `root`. The heap is never mutated.
    pub fn write(&self, heap: &Heap, root: &Value) -> Result<Document, WriteError> {
        let mut pass = WritePass::new(self.ctx, heap);
        if let (Some(policy), Value::Ref(r)) = (self.ctx.ownership(), root) {
            let domain = OwnershipDomain::compute(policy, heap, *r);
            log::trace!("ownership domain of {r} holds {} object(s)", domain.len());
            pass.domain = Some(domain);
        }

        pass.top_level = root.as_ref();
        let root_index = pass.write_value(ROOT_NODE, root)?;
        let definitions = pass.write_definitions()?;
        if self.ctx.options().hoist_type_cache {
            pass.hoist_type_cache(root_index);
        }
        pass.log_summary();

        let mut frozen = pass.freeze();
        let root = frozen[root_index]
            .take()
            .ok_or_else(|| WriteError::Format("root node was not built".into()))?;
        let definitions = definitions
            .into_iter()
            .filter_map(|i| frozen[i].take())
            .collect();

        let options = self.ctx.options();
        Ok(Document {
            version: options.version,
            culture: options.culture.clone(),
            root,
            definitions,
        })
    }
}

/// A node under construction: children are arena indices until frozen.
struct NodeBuilder {
    node: Node,
    children: Vec<usize>,
}

#[derive(Clone, Copy)]
struct ObjectEntry {
    id: Option<u32>,
    /// The node holding the object's content, once written.
    node: Option<usize>,
}

struct TypeEntry {
    id: Option<u32>,
    first_node: usize,
}

/// State of one write call.
struct WritePass<'w> {
    ctx: &'w SerializationContext<'w>,
    heap: &'w Heap,
    separator: char,
    nodes: Vec<NodeBuilder>,
    objects: HashMap<ObjRef, ObjectEntry>,
    next_object_id: u32,
    types: HashMap<TypeDescriptor, TypeEntry>,
    /// Descriptors that received an id, in id order.
    cached_types: Vec<TypeDescriptor>,
    /// Records (and surrogate-written objects) currently being walked.
    owners: Vec<ObjRef>,
    /// The root object or the definition being started. Outside any owner
    /// only this object may be written inline.
    top_level: Option<ObjRef>,
    domain: Option<OwnershipDomain>,
    /// Objects written as stubs, in first-stub order.
    deferred: Vec<ObjRef>,
}

impl<'w> WritePass<'w> {
    fn new(ctx: &'w SerializationContext<'w>, heap: &'w Heap) -> Self {
        Self {
            ctx,
            heap,
            separator: decimal_separator(&ctx.options().culture),
            nodes: Vec::new(),
            objects: HashMap::new(),
            next_object_id: 0,
            types: HashMap::new(),
            cached_types: Vec::new(),
            owners: Vec::new(),
            top_level: None,
            domain: None,
            deferred: Vec::new(),
        }
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(NodeBuilder {
            node,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.nodes[parent].children.push(child);
    }

    fn write_value(&mut self, name: &str, value: &Value) -> Result<usize, WriteError> {
        if let Value::Ref(r) = value {
            if self.heap.get(*r).is_none() {
                return Err(WriteError::DanglingHandle(*r));
            }
        }
        if self.heap.is_null(value) {
            return Ok(self.push(Node::null(name)));
        }
        if let Value::Ref(r) = value {
            return self.write_object(name, *r);
        }
        match format_scalar(value, self.separator) {
            Some((ty, text)) => {
                let mut node = Node::new(name);
                node.value = Some(text);
                let index = self.push(node);
                self.stamp_type(index, ty);
                Ok(index)
            }
            None => Ok(self.push(Node::null(name))),
        }
    }

    fn write_object(&mut self, name: &str, r: ObjRef) -> Result<usize, WriteError> {
        if self.outside_boundary(r) {
            log::trace!("{name}: {r} is outside the ownership domain");
            return Ok(self.push(Node::null(name)));
        }
        match self.objects.get(&r).copied() {
            Some(ObjectEntry {
                node: Some(first), ..
            }) => Ok(self.back_reference(name, r, first)),
            Some(ObjectEntry { id, node: None }) if self.may_write(r) => {
                self.write_content(name, r, id)
            }
            Some(ObjectEntry { id: Some(id), .. }) => Ok(self.stub(name, id)),
            _ if self.may_write(r) => self.write_content(name, r, None),
            _ => {
                let id = self.next_object_id();
                self.objects.insert(
                    r,
                    ObjectEntry {
                        id: Some(id),
                        node: None,
                    },
                );
                self.deferred.push(r);
                log::trace!("{name}: deferring {r} as id {id}");
                Ok(self.stub(name, id))
            }
        }
    }

    fn next_object_id(&mut self) -> u32 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    fn outside_boundary(&self, r: ObjRef) -> bool {
        match (self.ctx.ownership(), &self.domain) {
            (Some(policy), Some(domain)) => policy.is_bounded(self.heap, r) && !domain.contains(r),
            _ => false,
        }
    }

    /// Whether `r` may be written inline from the current position. With an
    /// empty owner stack that is only the root or the definition itself.
    fn may_write(&self, r: ObjRef) -> bool {
        let Some(policy) = self.ctx.ownership() else {
            return true;
        };
        let Some(owner) = policy.designated_owner(self.heap, r) else {
            return true;
        };
        match self.owners.last() {
            Some(current) => owner == *current,
            None => self.top_level == Some(r),
        }
    }

    fn back_reference(&mut self, name: &str, r: ObjRef, first: usize) -> usize {
        let id = match self.objects.get(&r).and_then(|e| e.id) {
            Some(id) => id,
            None => {
                let id = self.next_object_id();
                self.nodes[first].node.id = Some(id);
                self.objects.insert(
                    r,
                    ObjectEntry {
                        id: Some(id),
                        node: Some(first),
                    },
                );
                id
            }
        };
        log::trace!("{name}: back-reference to {r} (id {id})");
        let mut node = Node::new(name);
        node.id = Some(id);
        self.push(node)
    }

    fn stub(&mut self, name: &str, id: u32) -> usize {
        let mut node = Node::new(name);
        node.id = Some(id);
        node.deferred = true;
        self.push(node)
    }

    fn write_content(
        &mut self,
        name: &str,
        r: ObjRef,
        id: Option<u32>,
    ) -> Result<usize, WriteError> {
        let heap = self.heap;
        let object = heap.get(r).ok_or(WriteError::DanglingHandle(r))?;

        let mut node = Node::new(name);
        node.id = id;
        let index = self.push(node);
        self.objects.insert(r, ObjectEntry { id, node: Some(index) });
        self.stamp_type(index, object.ty.clone());

        if let Some(reference) = self.ctx.externalizer().and_then(|e| e.try_externalize(heap, r)) {
            log::trace!("{name}: {r} externalized as {reference:?}");
            match reference {
                ExternalRef::Builtin(builtin) => self.nodes[index].node.builtin_id = Some(builtin),
                ExternalRef::Path(path) => self.nodes[index].node.resource_path = Some(path),
            }
            return Ok(index);
        }

        if let Some(surrogate) = self.ctx.surrogate_for(&object.ty) {
            log::trace!("{name}: {r} written by surrogate for '{}'", object.ty);
            let mut extracted = Extracted::new();
            surrogate.extract(heap, r, &mut extracted);
            self.owners.push(r);
            for (member, value) in extracted.into_members() {
                let child = match value {
                    ExtractedMember::Value(value) => self.write_value(&member, &value)?,
                    ExtractedMember::Text(text) => self.loose_text(&member, text),
                };
                self.attach(index, child);
            }
            self.owners.pop();
            return Ok(index);
        }

        match &object.body {
            Body::Text(text) => {
                self.nodes[index].node.value = Some(text.clone());
            }
            Body::Record(_) => {
                self.owners.push(r);
                let fields = self.ctx.registry().fields_of(&object.ty);
                for field in fields.iter() {
                    let Some(value) = heap.field(r, &field.name) else {
                        continue;
                    };
                    let child = self.write_value(&field.name, value)?;
                    self.attach(index, child);
                }
                self.owners.pop();
            }
            Body::Sequence { ranks, items } => {
                if ranks.len() > 1 {
                    self.nodes[index].node.ranks = Some(ranks.clone());
                }
                for item in items {
                    let child = self.write_value(ITEM_NODE, item)?;
                    self.attach(index, child);
                }
            }
            Body::Map(entries) => {
                for (key, value) in entries {
                    let entry = self.push(Node::new(ENTRY_NODE));
                    let key = self.write_value(KEY_NODE, key)?;
                    let value = self.write_value(VALUE_NODE, value)?;
                    self.attach(entry, key);
                    self.attach(entry, value);
                    self.attach(index, entry);
                }
            }
        }
        Ok(index)
    }

    /// A string produced by a surrogate that has no heap object.
    fn loose_text(&mut self, name: &str, text: String) -> usize {
        let mut node = Node::new(name);
        node.value = Some(text);
        let index = self.push(node);
        self.stamp_type(index, TypeDescriptor::string());
        index
    }

    fn stamp_type(&mut self, index: usize, ty: TypeDescriptor) {
        let Some(entry) = self.types.get_mut(&ty) else {
            self.types.insert(
                ty.clone(),
                TypeEntry {
                    id: None,
                    first_node: index,
                },
            );
            self.nodes[index].node.ty = Some(TypeRef::Inline(ty));
            return;
        };
        let id = match entry.id {
            Some(id) => id,
            None => {
                let id = self.cached_types.len() as u32;
                entry.id = Some(id);
                let first = &mut self.nodes[entry.first_node].node;
                if let Some(TypeRef::Inline(descriptor)) = first.ty.take() {
                    first.ty = Some(TypeRef::Declared { id, descriptor });
                }
                self.cached_types.push(ty);
                id
            }
        };
        self.nodes[index].node.ty = Some(TypeRef::Cached(id));
    }

    /// Write every deferred object no owner wrote during the walk. Writing
    /// a definition can defer more objects, so loop until none remain.
    fn write_definitions(&mut self) -> Result<Vec<usize>, WriteError> {
        let mut definitions = Vec::new();
        let mut cursor = 0;
        while cursor < self.deferred.len() {
            let r = self.deferred[cursor];
            cursor += 1;
            let Some(ObjectEntry { id, node: None }) = self.objects.get(&r).copied() else {
                continue;
            };
            log::trace!("writing definition of {r}");
            let owners = std::mem::take(&mut self.owners);
            self.top_level = Some(r);
            definitions.push(self.write_content(DEFINITION_NODE, r, id)?);
            self.owners = owners;
        }
        Ok(definitions)
    }

    /// Move declarations into a type-cache block under the root node.
    fn hoist_type_cache(&mut self, root: usize) {
        if self.cached_types.is_empty() || self.nodes[root].node.value.is_some() {
            return;
        }
        let block = self.push(Node::new(TYPE_CACHE_NODE));
        for (id, descriptor) in std::mem::take(&mut self.cached_types).into_iter().enumerate() {
            let id = id as u32;
            if let Some(entry) = self.types.get(&descriptor) {
                self.nodes[entry.first_node].node.ty = Some(TypeRef::Cached(id));
            }
            let mut node = Node::new(TYPE_ENTRY_NODE);
            node.ty = Some(TypeRef::Declared { id, descriptor });
            let child = self.push(node);
            self.attach(block, child);
        }
        let root = &mut self.nodes[root];
        root.node.has_type_cache = true;
        root.children.insert(0, block);
    }

    fn log_summary(&self) {
        let shared = self.objects.values().filter(|e| e.id.is_some()).count();
        log::debug!(
            "wrote {} node(s): {} object(s), {} shared, {} deferred, {} type(s), {} cached",
            self.nodes.len(),
            self.objects.len(),
            shared,
            self.deferred.len(),
            self.types.len(),
            self.types.values().filter(|t| t.id.is_some()).count(),
        );
    }

    /// Turn the arena into owned trees. Children always have larger indices
    /// than their parent, so one reverse sweep builds every subtree.
    fn freeze(self) -> Vec<Option<Node>> {
        let mut built: Vec<Option<Node>> = (0..self.nodes.len()).map(|_| None).collect();
        for (index, builder) in self.nodes.into_iter().enumerate().rev() {
            let mut node = builder.node;
            node.children = builder
                .children
                .iter()
                .filter_map(|child| built[*child].take())
                .collect();
            built[index] = Some(node);
        }
        built
    }
}

//! Structural ownership: which objects a write may descend into, and
//! which objects may only be written by their owner.
//!
//! The caller decides what counts as structural containment by passing an
//! [`OwnershipPolicy`]; the engine never guesses. Before writing begins the
//! [`OwnershipDomain`] is computed once by following only
//! [`structural_children`](OwnershipPolicy::structural_children) from the
//! root. During the walk:
//!
//! - a [`bounded`](OwnershipPolicy::is_bounded) object outside the domain
//!   is written as null and never descended into;
//! - an object with a [`designated_owner`](OwnershipPolicy::designated_owner)
//!   reached from anywhere but that owner is written as a deferred stub.

use std::collections::{HashMap, HashSet};

use crate::descriptor::TypeDescriptor;
use crate::heap::{Body, Heap, ObjRef, Value};

/// Caller-supplied definition of structural containment.
pub trait OwnershipPolicy: Send + Sync {
    /// Objects structurally contained by `object`.
    fn structural_children(&self, heap: &Heap, object: ObjRef) -> Vec<ObjRef>;

    /// Whether `object` is subject to the ownership boundary.
    fn is_bounded(&self, heap: &Heap, object: ObjRef) -> bool;

    /// The only object allowed to write `object` inline.
    ///
    /// The default implementation returns `None` (no write restriction).
    fn designated_owner(&self, _heap: &Heap, _object: ObjRef) -> Option<ObjRef> {
        None
    }
}

/// The set of objects structurally reachable from a root.
#[derive(Clone, Debug, Default)]
pub struct OwnershipDomain {
    members: HashSet<ObjRef>,
}

impl OwnershipDomain {
    /// Walk structural containment from `root` without recursion.
    pub fn compute(policy: &dyn OwnershipPolicy, heap: &Heap, root: ObjRef) -> Self {
        let mut members = HashSet::new();
        let mut stack = vec![root];
        while let Some(object) = stack.pop() {
            if heap.is_null(&Value::Ref(object)) || !members.insert(object) {
                continue;
            }
            stack.extend(policy.structural_children(heap, object));
        }
        Self { members }
    }

    pub fn contains(&self, object: ObjRef) -> bool {
        self.members.contains(&object)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// An [`OwnershipPolicy`] driven by named record fields.
///
/// - `contains(ty, field)` declares that `field` of `ty` holds structurally
///   owned objects (a reference, or a sequence of references);
/// - `bounded(ty)` subjects `ty` to the ownership boundary;
/// - `owned_via(ty, field)` makes `ty` a deferred category whose designated
///   owner is the object referenced by its `field`.
#[derive(Clone, Debug, Default)]
pub struct FieldOwnership {
    structural: HashMap<TypeDescriptor, Vec<String>>,
    bounded: HashSet<TypeDescriptor>,
    owner_fields: HashMap<TypeDescriptor, String>,
}

impl FieldOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(mut self, ty: TypeDescriptor, field: impl Into<String>) -> Self {
        self.structural.entry(ty).or_default().push(field.into());
        self
    }

    pub fn bounded(mut self, ty: TypeDescriptor) -> Self {
        self.bounded.insert(ty);
        self
    }

    pub fn owned_via(mut self, ty: TypeDescriptor, owner_field: impl Into<String>) -> Self {
        self.owner_fields.insert(ty, owner_field.into());
        self
    }
}

impl OwnershipPolicy for FieldOwnership {
    fn structural_children(&self, heap: &Heap, object: ObjRef) -> Vec<ObjRef> {
        let Some(obj) = heap.get(object) else {
            return Vec::new();
        };
        let Some(fields) = self.structural.get(&obj.ty) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for field in fields {
            let Some(target) = heap.field_ref(object, field) else {
                continue;
            };
            match heap.get(target).map(|o| &o.body) {
                Some(Body::Sequence { items, .. }) => {
                    children.extend(items.iter().filter_map(Value::as_ref));
                }
                Some(_) => children.push(target),
                None => {}
            }
        }
        children
    }

    fn is_bounded(&self, heap: &Heap, object: ObjRef) -> bool {
        heap.get(object)
            .is_some_and(|o| self.bounded.contains(&o.ty))
    }

    fn designated_owner(&self, heap: &Heap, object: ObjRef) -> Option<ObjRef> {
        let field = self.owner_fields.get(&heap.get(object)?.ty)?;
        heap.field_ref(object, field)
    }
}

//! Type registry: schema lookup and the cached serializable-member lists.
//!
//! [`TypeRegistry::fields_of`] answers "which members of this type are
//! written, in which order, under which names". The answer depends only on
//! registered schemas, so it is cached until the next registration and the
//! registry can be shared across calls.
//!
//! Member naming follows the base-merge rule: a type's own members come
//! first, then its base chain's. A base member whose name is already taken
//! is renamed with a `base.` prefix, repeatedly for deeper hierarchies
//! (`base.base.name`).

mod reflect;
mod schema;

pub use reflect::Reflect;
pub use schema::{FieldDescriptor, FieldKind, MemberDecl, MemberMode, Shape, TypeSchema, Visibility};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::TypeDescriptor;
use crate::error::ReadError;
use crate::heap::{Body, Heap, ObjRef, Object};

/// Module of the built-in generic containers.
pub const STD_MODULE: &str = "std";

#[derive(Default)]
struct RegistryInner {
    schemas: HashMap<TypeDescriptor, Arc<TypeSchema>>,
    /// Generic definitions keyed by `(definition, module)`.
    generics: HashMap<(String, String), Arc<TypeSchema>>,
    members: HashMap<TypeDescriptor, Arc<[FieldDescriptor]>>,
    fields: HashMap<TypeDescriptor, Arc<[FieldDescriptor]>>,
}

/// Registry of type schemas with a cached member walk.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create a registry with the core scalars, `String`, and the
    /// `std` containers (`Vec`, `Array`, `HashMap`) registered.
    pub fn new() -> Self {
        let registry = Self::empty();
        for scalar in [
            TypeDescriptor::boolean(),
            TypeDescriptor::int(),
            TypeDescriptor::uint(),
            TypeDescriptor::float(),
            TypeDescriptor::character(),
        ] {
            registry.register(TypeSchema::primitive(scalar));
        }
        registry.register(TypeSchema::text(TypeDescriptor::string()));
        registry.register_generic(TypeSchema::sequence(TypeDescriptor::new("Vec", STD_MODULE)));
        registry.register_generic(TypeSchema::sequence(TypeDescriptor::new("Array", STD_MODULE)));
        registry.register_generic(TypeSchema::map(TypeDescriptor::new("HashMap", STD_MODULE)));
        registry
    }

    /// Create a registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register (or replace) a schema. Clears the member caches.
    pub fn register(&self, schema: TypeSchema) {
        let mut inner = self.inner.write();
        inner.members.clear();
        inner.fields.clear();
        inner
            .schemas
            .insert(schema.descriptor.clone(), Arc::new(schema));
    }

    /// Register a generic definition. `schema.descriptor.name` is the
    /// definition name (`Vec`), matched against every construction.
    pub fn register_generic(&self, schema: TypeSchema) {
        let mut inner = self.inner.write();
        inner.members.clear();
        inner.fields.clear();
        let key = (
            schema.descriptor.definition().to_owned(),
            schema.descriptor.module.clone(),
        );
        inner.generics.insert(key, Arc::new(schema));
    }

    /// Register a [`Reflect`] type and its base chain.
    pub fn register_type<T: Reflect>(&self) {
        T::register_dependencies(self);
        self.register(T::schema());
    }

    /// Look up a schema: exact descriptor first, then generic definition.
    pub fn schema(&self, ty: &TypeDescriptor) -> Option<Arc<TypeSchema>> {
        let inner = self.inner.read();
        if let Some(schema) = inner.schemas.get(ty) {
            return Some(schema.clone());
        }
        if ty.is_generic() {
            let key = (ty.definition().to_owned(), ty.module.clone());
            return inner.generics.get(&key).cloned();
        }
        None
    }

    pub fn contains(&self, ty: &TypeDescriptor) -> bool {
        self.schema(ty).is_some()
    }

    /// All declared members of `ty` and its bases, renamed per the
    /// base-merge rule. Unknown types have no members.
    pub fn members_of(&self, ty: &TypeDescriptor) -> Arc<[FieldDescriptor]> {
        if let Some(cached) = self.inner.read().members.get(ty) {
            return cached.clone();
        }
        let members: Arc<[FieldDescriptor]> = self.collect_members(ty).into();
        self.inner
            .write()
            .members
            .insert(ty.clone(), members.clone());
        members
    }

    /// The serialized members of `ty`, in write order.
    pub fn fields_of(&self, ty: &TypeDescriptor) -> Arc<[FieldDescriptor]> {
        if let Some(cached) = self.inner.read().fields.get(ty) {
            return cached.clone();
        }
        let fields: Arc<[FieldDescriptor]> = self
            .members_of(ty)
            .iter()
            .filter(|f| f.serialized)
            .cloned()
            .collect::<Vec<_>>()
            .into();
        self.inner.write().fields.insert(ty.clone(), fields.clone());
        fields
    }

    fn collect_members(&self, ty: &TypeDescriptor) -> Vec<FieldDescriptor> {
        let mut out: Vec<FieldDescriptor> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(ty.clone());

        while let Some(desc) = current.take() {
            if !visited.insert(desc.clone()) {
                log::warn!("base chain of '{ty}' loops back to '{desc}'");
                break;
            }
            let Some(schema) = self.schema(&desc) else {
                break;
            };
            for member in &schema.members {
                let mut name = member.name.clone();
                while out.iter().any(|f| f.name == name) {
                    name = format!("base.{name}");
                }
                out.push(FieldDescriptor {
                    name,
                    kind: member.kind.clone(),
                    declared_in: schema.descriptor.clone(),
                    serialized: schema.includes(member),
                });
            }
            current = schema.base.clone();
        }
        out
    }

    /// Number of base steps from `ty` up to `target`, if `ty` is assignable
    /// to `target`. Constructed generics are compared argument-wise.
    pub fn inheritance_distance(
        &self,
        ty: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Option<usize> {
        let mut visited = HashSet::new();
        let mut current = Some(ty.clone());
        let mut distance = 0;
        while let Some(desc) = current.take() {
            if &desc == target || self.generic_assignable(&desc, target) {
                return Some(distance);
            }
            if !visited.insert(desc.clone()) {
                return None;
            }
            current = self.schema(&desc).and_then(|s| s.base.clone());
            distance += 1;
        }
        None
    }

    /// Whether a value of type `ty` may be stored where `target` is expected.
    pub fn is_assignable(&self, ty: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        self.inheritance_distance(ty, target).is_some()
    }

    fn generic_assignable(&self, ty: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        if !ty.is_generic() || !target.is_generic() {
            return false;
        }
        if ty.definition() != target.definition() || ty.module != target.module {
            return false;
        }
        let (args, target_args) = (ty.arguments(), target.arguments());
        args.len() == target_args.len()
            && args
                .iter()
                .zip(&target_args)
                .all(|(a, t)| self.is_assignable(a, t))
    }

    /// Allocate a default instance of `ty` in `heap`.
    pub fn instantiate(&self, ty: &TypeDescriptor, heap: &mut Heap) -> Result<ObjRef, ReadError> {
        let schema = self
            .schema(ty)
            .ok_or_else(|| ReadError::UnresolvableType(ty.to_string()))?;
        if !schema.constructible {
            return Err(ReadError::NoDefaultConstruction(ty.clone()));
        }
        let body = match schema.shape {
            Shape::Record => Body::Record(
                self.members_of(ty)
                    .iter()
                    .map(|f| (f.name.clone(), f.kind.default_value()))
                    .collect(),
            ),
            Shape::Sequence => Body::Sequence {
                ranks: vec![0],
                items: Vec::new(),
            },
            Shape::Map => Body::Map(Vec::new()),
            Shape::Text => Body::Text(String::new()),
            Shape::Primitive | Shape::Enum(_) => {
                return Err(ReadError::NoDefaultConstruction(ty.clone()));
            }
        };
        Ok(heap.alloc(Object::new(ty.clone(), body)))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

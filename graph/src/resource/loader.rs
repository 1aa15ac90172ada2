use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::TypeDescriptor;
use crate::heap::{Heap, ObjRef, Value};

/// The host asset loader, as seen by the reader.
///
/// Loads are synchronous. A load that cannot produce an object of the
/// expected type returns `None` (or an empty list).
pub trait ResourceLoader: Send + Sync {
    /// Load the single resource stored at `path`.
    fn load(&self, path: &str, expected: &TypeDescriptor, heap: &mut Heap) -> Option<ObjRef>;

    /// Load every resource drawn from the source asset at `path`, in slice order.
    fn load_all(&self, path: &str, expected: &TypeDescriptor, heap: &mut Heap) -> Vec<ObjRef>;

    /// Load a builtin resource by its declared name.
    fn load_builtin(&self, name: &str, expected: &TypeDescriptor, heap: &mut Heap)
        -> Option<ObjRef>;
}

#[derive(Clone, Debug)]
struct ResourceEntry {
    ty: TypeDescriptor,
    name: String,
}

/// In-memory resource loader for tests and embedded resources.
///
/// Thread-safe and mutable after being handed to a
/// [`ResourceExternalizer`](super::ResourceExternalizer). Each load
/// allocates a fresh record holding the resource's declared name in the
/// `name` field.
///
/// # Example
///
/// ```
/// use redlilium_graph::{Heap, MemoryResources, ResourceLoader, TypeDescriptor};
///
/// let sprite = TypeDescriptor::new("Sprite", "game");
/// let resources = MemoryResources::new();
/// resources.insert("ui/cursor", sprite.clone(), "Cursor");
///
/// let mut heap = Heap::new();
/// let cursor = resources.load("ui/cursor", &sprite, &mut heap).unwrap();
/// assert_eq!(heap.get(cursor).unwrap().ty, sprite);
/// ```
#[derive(Clone, Default)]
pub struct MemoryResources {
    paths: Arc<RwLock<HashMap<String, Vec<ResourceEntry>>>>,
    builtins: Arc<RwLock<HashMap<String, TypeDescriptor>>>,
}

/// Field that holds the declared name of a loaded resource.
pub const RESOURCE_NAME_FIELD: &str = "name";

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a single resource at `path`. Overwrites any existing entry.
    pub fn insert(&self, path: impl Into<String>, ty: TypeDescriptor, name: impl Into<String>) {
        let entry = ResourceEntry {
            ty,
            name: name.into(),
        };
        self.paths.write().insert(path.into(), vec![entry]);
    }

    /// Store a source asset at `path` that yields one resource per name.
    pub fn insert_sliced(&self, path: impl Into<String>, ty: TypeDescriptor, names: &[&str]) {
        let entries = names
            .iter()
            .map(|name| ResourceEntry {
                ty: ty.clone(),
                name: (*name).to_owned(),
            })
            .collect();
        self.paths.write().insert(path.into(), entries);
    }

    pub fn insert_builtin(&self, name: impl Into<String>, ty: TypeDescriptor) {
        self.builtins.write().insert(name.into(), ty);
    }

    pub fn remove(&self, path: &str) -> bool {
        self.paths.write().remove(path).is_some()
    }
}

fn alloc_resource(heap: &mut Heap, ty: &TypeDescriptor, name: &str) -> ObjRef {
    let text = heap.alloc_text(name);
    heap.alloc_record(ty.clone(), vec![(RESOURCE_NAME_FIELD.to_owned(), Value::Ref(text))])
}

impl ResourceLoader for MemoryResources {
    fn load(&self, path: &str, expected: &TypeDescriptor, heap: &mut Heap) -> Option<ObjRef> {
        let paths = self.paths.read();
        let entry = paths.get(path)?.first()?;
        if &entry.ty != expected {
            log::debug!("resource '{path}' is '{}', expected '{expected}'", entry.ty);
            return None;
        }
        Some(alloc_resource(heap, &entry.ty, &entry.name))
    }

    fn load_all(&self, path: &str, expected: &TypeDescriptor, heap: &mut Heap) -> Vec<ObjRef> {
        let paths = self.paths.read();
        let Some(entries) = paths.get(path) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|e| &e.ty == expected)
            .map(|e| alloc_resource(heap, &e.ty, &e.name))
            .collect()
    }

    fn load_builtin(
        &self,
        name: &str,
        expected: &TypeDescriptor,
        heap: &mut Heap,
    ) -> Option<ObjRef> {
        let builtins = self.builtins.read();
        let ty = builtins.get(name).filter(|ty| *ty == expected)?;
        Some(alloc_resource(heap, ty, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite() -> TypeDescriptor {
        TypeDescriptor::new("Sprite", "game")
    }

    #[test]
    fn load_checks_expected_type() {
        let resources = MemoryResources::new();
        resources.insert("ui/cursor", sprite(), "Cursor");
        let mut heap = Heap::new();
        assert!(resources.load("ui/cursor", &sprite(), &mut heap).is_some());
        assert!(resources
            .load("ui/cursor", &TypeDescriptor::new("Sound", "game"), &mut heap)
            .is_none());
        assert!(resources.load("ui/missing", &sprite(), &mut heap).is_none());
    }

    #[test]
    fn load_all_keeps_slice_order() {
        let resources = MemoryResources::new();
        resources.insert_sliced("sprites/atlas", sprite(), &["A", "B", "C"]);
        let mut heap = Heap::new();
        let all = resources.load_all("sprites/atlas", &sprite(), &mut heap);
        let names: Vec<_> = all
            .iter()
            .map(|r| heap.text(heap.field(*r, RESOURCE_NAME_FIELD).unwrap()).unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn builtins_by_name() {
        let resources = MemoryResources::new();
        resources.insert_builtin("Default-Material", sprite());
        let mut heap = Heap::new();
        let r = resources
            .load_builtin("Default-Material", &sprite(), &mut heap)
            .unwrap();
        assert_eq!(
            heap.text(heap.field(r, RESOURCE_NAME_FIELD).unwrap()),
            Some("Default-Material")
        );
        assert!(resources.load_builtin("Other", &sprite(), &mut heap).is_none());
    }

    #[test]
    fn clones_share_storage() {
        let resources = MemoryResources::new();
        let shared = resources.clone();
        shared.insert("a", sprite(), "A");
        let mut heap = Heap::new();
        assert!(resources.load("a", &sprite(), &mut heap).is_some());
        assert!(resources.remove("a"));
        assert!(shared.load("a", &sprite(), &mut heap).is_none());
    }
}

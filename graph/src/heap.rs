//! The object arena that serialization walks and deserialization fills.
//!
//! Objects live in a [`Heap`] and are addressed by [`ObjRef`] handles.
//! Identity is handle equality: two objects holding the same text are
//! still two objects, and the writer deduplicates by handle only.
//!
//! Destroyed objects stay in the arena as *fake nulls*: the handle is still
//! valid to hold, but [`Heap::is_null`] reports it as null. Every null check
//! in the engine goes through that helper.

use serde::{Deserialize, Serialize};

use crate::descriptor::TypeDescriptor;

/// Opaque handle to an object in a [`Heap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    /// Raw arena index, for diagnostics.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A slot value: either an inline scalar or a reference into the heap.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    /// An enum value, recorded by its underlying ordinal.
    Enum { ty: TypeDescriptor, ordinal: i64 },
    Ref(ObjRef),
}

impl Value {
    pub fn as_ref(&self) -> Option<ObjRef> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::Ref(r)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

/// Where a value lives inside its container object.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Field(String),
    Index(usize),
    Key(Value),
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Field(name) => write!(f, ".{name}"),
            Slot::Index(i) => write!(f, "[{i}]"),
            Slot::Key(k) => write!(f, "[{k:?}]"),
        }
    }
}

/// The contents of an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Ordered named slots.
    Record(Vec<(String, Value)>),
    /// Row-major items. More than one rank marks a multi-dimensional sequence.
    Sequence { ranks: Vec<usize>, items: Vec<Value> },
    /// Ordered key/value entries.
    Map(Vec<(Value, Value)>),
    /// A string object.
    Text(String),
}

/// A heap object: its type and its contents.
#[derive(Clone, Debug)]
pub struct Object {
    pub ty: TypeDescriptor,
    pub body: Body,
    destroyed: bool,
}

impl Object {
    pub fn new(ty: TypeDescriptor, body: Body) -> Self {
        Self {
            ty,
            body,
            destroyed: false,
        }
    }

    /// Whether the host destroyed this object (fake null).
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// Arena of objects addressed by [`ObjRef`].
#[derive(Clone, Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> ObjRef {
        let r = ObjRef(self.objects.len() as u32);
        self.objects.push(object);
        r
    }

    pub fn alloc_record(&mut self, ty: TypeDescriptor, fields: Vec<(String, Value)>) -> ObjRef {
        self.alloc(Object::new(ty, Body::Record(fields)))
    }

    /// Allocate a one-dimensional sequence.
    pub fn alloc_sequence(&mut self, ty: TypeDescriptor, items: Vec<Value>) -> ObjRef {
        let ranks = vec![items.len()];
        self.alloc(Object::new(ty, Body::Sequence { ranks, items }))
    }

    /// Allocate a string object. Every call yields a distinct instance.
    pub fn alloc_text(&mut self, text: impl Into<String>) -> ObjRef {
        self.alloc(Object::new(TypeDescriptor::string(), Body::Text(text.into())))
    }

    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.objects.get(r.0 as usize)
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(r.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Mark an object destroyed. Its handle becomes a fake null.
    pub fn destroy(&mut self, r: ObjRef) {
        if let Some(obj) = self.objects.get_mut(r.0 as usize) {
            obj.destroyed = true;
        }
    }

    /// The single null check: `Value::Null`, a dangling handle, or a
    /// handle to a destroyed object.
    pub fn is_null(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Ref(r) => self.get(*r).map_or(true, Object::is_destroyed),
            _ => false,
        }
    }

    /// Read a record field. `None` if the object is not a record or has no such field.
    pub fn field(&self, r: ObjRef, name: &str) -> Option<&Value> {
        match &self.get(r)?.body {
            Body::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convenience: follow a record field holding a reference.
    pub fn field_ref(&self, r: ObjRef, name: &str) -> Option<ObjRef> {
        self.field(r, name).and_then(Value::as_ref)
    }

    /// Set a record field, appending it if absent. Returns `false` if `r`
    /// is not a record.
    pub fn set_field(&mut self, r: ObjRef, name: &str, value: Value) -> bool {
        match self.get_mut(r).map(|o| &mut o.body) {
            Some(Body::Record(fields)) => {
                match fields.iter_mut().find(|(n, _)| n == name) {
                    Some((_, slot)) => *slot = value,
                    None => fields.push((name.to_owned(), value)),
                }
                true
            }
            _ => false,
        }
    }

    /// Set a sequence element. Returns `false` if out of range or not a sequence.
    pub fn set_index(&mut self, r: ObjRef, index: usize, value: Value) -> bool {
        match self.get_mut(r).map(|o| &mut o.body) {
            Some(Body::Sequence { items, .. }) => match items.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Set a map entry's value by key, appending the entry if absent.
    pub fn set_key(&mut self, r: ObjRef, key: Value, value: Value) -> bool {
        match self.get_mut(r).map(|o| &mut o.body) {
            Some(Body::Map(entries)) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, slot)) => *slot = value,
                    None => entries.push((key, value)),
                }
                true
            }
            _ => false,
        }
    }

    /// Store `value` into `slot` of object `r`.
    pub fn assign(&mut self, r: ObjRef, slot: &Slot, value: Value) -> bool {
        match slot {
            Slot::Field(name) => self.set_field(r, name, value),
            Slot::Index(i) => self.set_index(r, *i, value),
            Slot::Key(k) => self.set_key(r, k.clone(), value),
        }
    }

    /// The text of a string object, if `value` refers to one.
    pub fn text(&self, value: &Value) -> Option<&str> {
        match &self.get(value.as_ref()?)?.body {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Rewrite every reference to `old` held by objects allocated at or
    /// after index `from` so it points at `new`.
    pub(crate) fn retarget(&mut self, from: usize, old: ObjRef, new: ObjRef) {
        let swap = |v: &mut Value| {
            if *v == Value::Ref(old) {
                *v = Value::Ref(new);
            }
        };
        for obj in self.objects.iter_mut().skip(from) {
            match &mut obj.body {
                Body::Record(fields) => fields.iter_mut().for_each(|(_, v)| swap(v)),
                Body::Sequence { items, .. } => items.iter_mut().for_each(swap),
                Body::Map(entries) => entries.iter_mut().for_each(|(k, v)| {
                    swap(k);
                    swap(v);
                }),
                Body::Text(_) => {}
            }
        }
    }

    /// Sequence items, if `r` is a sequence.
    pub fn items(&self, r: ObjRef) -> Option<&[Value]> {
        match &self.get(r)?.body {
            Body::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }
}

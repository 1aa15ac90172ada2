//! Compile-time declared type schemas.
//!
//! A [`TypeSchema`] enumerates every member a type declares, together with
//! the markers that decide whether the member is serialized. Schemas are
//! produced by `#[derive(Reflect)]` or built by hand with the builder
//! methods below.

use crate::descriptor::TypeDescriptor;
use crate::heap::Value;

/// Declared visibility of a member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// Storage kind of a member, used for default construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    UInt,
    Float,
    Char,
    Enum(TypeDescriptor),
    Text,
    Reference,
}

impl FieldKind {
    /// The value a freshly constructed instance holds in a member of this kind.
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int => Value::Int(0),
            FieldKind::UInt => Value::UInt(0),
            FieldKind::Float => Value::Float(0.0),
            FieldKind::Char => Value::Char('\0'),
            FieldKind::Enum(ty) => Value::Enum {
                ty: ty.clone(),
                ordinal: 0,
            },
            FieldKind::Text | FieldKind::Reference => Value::Null,
        }
    }
}

/// Whether a type exposes raw fields or accessor-style properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MemberMode {
    #[default]
    Fields,
    Properties,
}

/// The structural shape of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Record,
    Sequence,
    Map,
    Text,
    Primitive,
    /// Enum with variant names in ordinal order.
    Enum(Vec<String>),
}

/// One declared member of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: FieldKind,
    pub visibility: Visibility,
    /// Opt-in for non-public fields.
    pub include: bool,
    pub ignore: bool,
    pub obsolete: bool,
    pub non_serialized: bool,
    pub getter: bool,
    pub setter: bool,
}

impl MemberDecl {
    pub fn public(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            include: false,
            ignore: false,
            obsolete: false,
            non_serialized: false,
            getter: true,
            setter: true,
        }
    }

    pub fn private(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            visibility: Visibility::Private,
            ..Self::public(name, kind)
        }
    }

    pub fn include(mut self) -> Self {
        self.include = true;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn obsolete(mut self) -> Self {
        self.obsolete = true;
        self
    }

    pub fn non_serialized(mut self) -> Self {
        self.non_serialized = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.setter = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.getter = false;
        self
    }

    /// Field inclusion: public, or opted in; never when ignored or obsolete.
    pub fn is_serialized_field(&self) -> bool {
        if self.ignore || self.obsolete {
            return false;
        }
        self.visibility == Visibility::Public || self.include
    }

    /// Property inclusion: readable, writable, and not marked non-serialized.
    pub fn is_serialized_property(&self) -> bool {
        self.getter && self.setter && !self.non_serialized
    }
}

/// Everything the engine knows about one type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeSchema {
    pub descriptor: TypeDescriptor,
    pub shape: Shape,
    pub base: Option<TypeDescriptor>,
    pub members: Vec<MemberDecl>,
    pub member_mode: MemberMode,
    /// Whether a default instance can be allocated without an override.
    pub constructible: bool,
}

impl TypeSchema {
    fn with_shape(descriptor: TypeDescriptor, shape: Shape) -> Self {
        Self {
            descriptor,
            shape,
            base: None,
            members: Vec::new(),
            member_mode: MemberMode::Fields,
            constructible: true,
        }
    }

    pub fn record(descriptor: TypeDescriptor) -> Self {
        Self::with_shape(descriptor, Shape::Record)
    }

    pub fn sequence(descriptor: TypeDescriptor) -> Self {
        Self::with_shape(descriptor, Shape::Sequence)
    }

    pub fn map(descriptor: TypeDescriptor) -> Self {
        Self::with_shape(descriptor, Shape::Map)
    }

    pub fn text(descriptor: TypeDescriptor) -> Self {
        Self::with_shape(descriptor, Shape::Text)
    }

    pub fn primitive(descriptor: TypeDescriptor) -> Self {
        Self {
            constructible: false,
            ..Self::with_shape(descriptor, Shape::Primitive)
        }
    }

    pub fn enumeration(descriptor: TypeDescriptor, variants: Vec<String>) -> Self {
        Self {
            constructible: false,
            ..Self::with_shape(descriptor, Shape::Enum(variants))
        }
    }

    pub fn with_base(mut self, base: TypeDescriptor) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }

    pub fn properties(mut self) -> Self {
        self.member_mode = MemberMode::Properties;
        self
    }

    /// Mark the type as having no default construction.
    pub fn abstract_type(mut self) -> Self {
        self.constructible = false;
        self
    }

    /// Apply this schema's inclusion rule to one of its own members.
    pub fn includes(&self, member: &MemberDecl) -> bool {
        match self.member_mode {
            MemberMode::Fields => member.is_serialized_field(),
            MemberMode::Properties => member.is_serialized_property(),
        }
    }
}

/// A resolved member of a type, after base merging and renaming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Slot and node name. Colliding base members carry `base.` prefixes.
    pub name: String,
    pub kind: FieldKind,
    /// The type that declared the member.
    pub declared_in: TypeDescriptor,
    pub serialized: bool,
}

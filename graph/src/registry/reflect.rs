//! The [`Reflect`] trait implemented by `#[derive(Reflect)]`.

use crate::descriptor::TypeDescriptor;

use super::{TypeRegistry, TypeSchema};

/// Compile-time schema declaration for a serializable type.
///
/// # Deriving
///
/// ```ignore
/// #[derive(Reflect)]
/// #[reflect(module = "game")]
/// struct Item {
///     pub name: String,
///     pub count: i32,
///     #[reflect(include)]
///     durability: f32,
///     #[reflect(ignore)]
///     pub cached_weight: f32,
/// }
///
/// #[derive(Reflect)]
/// #[reflect(module = "game", base = Item)]
/// struct Sword {
///     pub name: String, // registered as `name`, Item's becomes `base.name`
///     pub damage: f32,
/// }
/// ```
pub trait Reflect: 'static {
    /// The descriptor written into documents for this type.
    fn descriptor() -> TypeDescriptor;

    /// The full member declaration of this type.
    fn schema() -> TypeSchema;

    /// Register types this schema depends on (its base chain).
    ///
    /// The default implementation registers nothing.
    fn register_dependencies(_registry: &TypeRegistry) {}
}

#[cfg(test)]
mod tests {
    use crate::registry::{FieldKind, TypeRegistry};
    use crate::Reflect;

    #[allow(dead_code)]
    #[derive(Reflect)]
    #[reflect(module = "test")]
    struct Waypoint {
        pub x: f64,
        pub y: f64,
        #[reflect(ignore)]
        pub visited: bool,
    }

    #[allow(dead_code)]
    #[derive(Reflect)]
    #[reflect(module = "test", base = Waypoint)]
    struct Checkpoint {
        pub x: f64,
        pub label: String,
    }

    #[test]
    fn derive_expands_inside_the_crate() {
        let registry = TypeRegistry::new();
        registry.register_type::<Checkpoint>();
        let fields = registry.fields_of(&Checkpoint::descriptor());
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["x", "label", "base.x", "y"]);
        assert_eq!(fields[1].kind, FieldKind::Text);
        assert!(registry.contains(&Waypoint::descriptor()));
    }
}

//! Type descriptors written into serialized documents.
//!
//! A [`TypeDescriptor`] is the `(fully qualified name, module)` pair that
//! identifies a type across a write/read cycle. Generic types carry their
//! arguments inside the name, each argument qualified with its module:
//!
//! ```
//! use redlilium_graph::TypeDescriptor;
//!
//! let item = TypeDescriptor::new("Item", "game");
//! let list = TypeDescriptor::generic("Vec", "std", &[item.clone()]);
//! assert_eq!(list.name, "Vec<game::Item>");
//! assert_eq!(list.definition(), "Vec");
//! assert_eq!(list.arguments(), vec![item]);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Module name used for the built-in scalar and string types.
pub const CORE_MODULE: &str = "core";

/// A `(name, module)` pair identifying a serializable type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully qualified type name, including generic arguments.
    pub name: String,
    /// The module (assembly, crate, package) defining the type.
    pub module: String,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }

    /// Descriptor of a type deriving [`Reflect`](crate::Reflect).
    pub fn of<T: crate::Reflect>() -> Self {
        T::descriptor()
    }

    /// Build a constructed generic descriptor such as `Vec<game::Item>`.
    pub fn generic(
        definition: &str,
        module: impl Into<String>,
        arguments: &[TypeDescriptor],
    ) -> Self {
        let args: Vec<String> = arguments.iter().map(|a| a.qualified()).collect();
        Self {
            name: format!("{definition}<{}>", args.join(", ")),
            module: module.into(),
        }
    }

    pub fn boolean() -> Self {
        Self::new("bool", CORE_MODULE)
    }

    pub fn int() -> Self {
        Self::new("i64", CORE_MODULE)
    }

    pub fn uint() -> Self {
        Self::new("u64", CORE_MODULE)
    }

    pub fn float() -> Self {
        Self::new("f64", CORE_MODULE)
    }

    pub fn character() -> Self {
        Self::new("char", CORE_MODULE)
    }

    pub fn string() -> Self {
        Self::new("String", CORE_MODULE)
    }

    /// `module::name`, the form used for generic arguments.
    pub fn qualified(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module, self.name)
        }
    }

    /// Parse the `module::name` form produced by [`qualified`](Self::qualified).
    pub fn parse_qualified(text: &str) -> Self {
        let text = text.trim();
        // Only a `::` before any generic bracket separates the module.
        let head_end = text.find('<').unwrap_or(text.len());
        match text[..head_end].find("::") {
            Some(pos) => Self::new(&text[pos + 2..], &text[..pos]),
            None => Self::new(text, ""),
        }
    }

    /// The generic definition name (`Vec` for `Vec<game::Item>`).
    pub fn definition(&self) -> &str {
        match self.name.find('<') {
            Some(pos) => &self.name[..pos],
            None => &self.name,
        }
    }

    pub fn is_generic(&self) -> bool {
        self.name.contains('<')
    }

    /// The generic arguments, in declaration order. Empty for non-generic types.
    pub fn arguments(&self) -> Vec<TypeDescriptor> {
        let (Some(open), Some(close)) = (self.name.find('<'), self.name.rfind('>')) else {
            return Vec::new();
        };
        if close <= open {
            return Vec::new();
        }
        split_top_level(&self.name[open + 1..close])
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse_qualified)
            .collect()
    }

    /// Whether this is one of the [`CORE_MODULE`] scalar descriptors.
    pub fn is_core_scalar(&self) -> bool {
        self.module == CORE_MODULE
            && matches!(self.name.as_str(), "bool" | "i64" | "u64" | "f64" | "char")
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.module)
    }
}

/// Split on commas that are not nested inside `<...>`.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

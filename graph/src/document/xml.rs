//! XML encoding of [`Document`]s.
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <graph version="1" culture="invariant">
//!   <root type="Bag" module="game" id="0">
//!     <owner id="0"/>
//!     <label type="String" module="core" value="loot"/>
//!   </root>
//! </graph>
//! ```
//!
//! The first element under `<graph>` is the root node; any further
//! elements are deferred-object definitions. Node names that are not
//! valid XML names are written as `<node name="...">`.

use std::fmt::Write as _;

use super::{Document, Node, TypeRef, INVARIANT_CULTURE};
use crate::descriptor::TypeDescriptor;
use crate::error::ReadError;

const DOCUMENT_ELEMENT: &str = "graph";
const FALLBACK_ELEMENT: &str = "node";

const ATTR_NAME: &str = "name";
const ATTR_ID: &str = "id";
const ATTR_TYPE_ID: &str = "typeid";
const ATTR_TYPE: &str = "type";
const ATTR_MODULE: &str = "module";
const ATTR_VALUE: &str = "value";
const ATTR_TYPE_CACHE: &str = "hasTypeCache";
const ATTR_DEFERRED: &str = "defered";
const ATTR_RESOURCE_PATH: &str = "ResourcePath";
const ATTR_BUILTIN_ID: &str = "BuiltinId";
const ATTR_RANKS: &str = "Ranks";

/// Encode a document as indented XML text.
pub fn to_xml(document: &Document) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    let _ = writeln!(
        out,
        "<{DOCUMENT_ELEMENT} version=\"{}\" culture=\"{}\">",
        document.version,
        escape(&document.culture)
    );
    write_node(&mut out, &document.root, 1);
    for def in &document.definitions {
        write_node(&mut out, def, 1);
    }
    let _ = writeln!(out, "</{DOCUMENT_ELEMENT}>");
    out
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    let element = if is_xml_name(&node.name) {
        node.name.as_str()
    } else {
        FALLBACK_ELEMENT
    };
    let _ = write!(out, "{indent}<{element}");
    if element != node.name {
        attr(out, ATTR_NAME, &node.name);
    }
    if let Some(id) = node.id {
        attr(out, ATTR_ID, &id.to_string());
    }
    match &node.ty {
        Some(TypeRef::Inline(d)) => type_attrs(out, d),
        Some(TypeRef::Cached(id)) => attr(out, ATTR_TYPE_ID, &id.to_string()),
        Some(TypeRef::Declared { id, descriptor }) => {
            attr(out, ATTR_TYPE_ID, &id.to_string());
            type_attrs(out, descriptor);
        }
        None => {}
    }
    if let Some(value) = &node.value {
        attr(out, ATTR_VALUE, value);
    }
    if node.has_type_cache {
        attr(out, ATTR_TYPE_CACHE, "true");
    }
    if node.deferred {
        attr(out, ATTR_DEFERRED, "true");
    }
    if let Some(path) = &node.resource_path {
        attr(out, ATTR_RESOURCE_PATH, path);
    }
    if let Some(builtin) = node.builtin_id {
        attr(out, ATTR_BUILTIN_ID, &builtin.to_string());
    }
    if let Some(ranks) = &node.ranks {
        let joined: Vec<String> = ranks.iter().map(|r| r.to_string()).collect();
        attr(out, ATTR_RANKS, &joined.join(","));
    }

    if node.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for child in &node.children {
        write_node(out, child, depth + 1);
    }
    let _ = writeln!(out, "{indent}</{element}>");
}

fn type_attrs(out: &mut String, descriptor: &TypeDescriptor) {
    attr(out, ATTR_TYPE, &descriptor.name);
    attr(out, ATTR_MODULE, &descriptor.module);
}

fn attr(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, " {name}=\"{}\"", escape(value));
}

/// Escape attribute text. Whitespace is written as character references
/// so attribute-value normalization leaves it intact.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_alphabetic() || first == '_') {
        return false;
    }
    if name.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("xml")) {
        return false;
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse XML text produced by [`to_xml`].
pub fn from_xml(text: &str) -> Result<Document, ReadError> {
    let xml = roxmltree::Document::parse(text).map_err(|e| ReadError::Malformed(e.to_string()))?;
    let element = xml.root_element();
    if element.tag_name().name() != DOCUMENT_ELEMENT {
        return Err(ReadError::Malformed(format!(
            "expected <{DOCUMENT_ELEMENT}>, found <{}>",
            element.tag_name().name()
        )));
    }
    let version = element
        .attribute("version")
        .ok_or_else(|| ReadError::Malformed("missing version attribute".into()))?
        .parse::<u32>()
        .map_err(|e| ReadError::Malformed(format!("bad version: {e}")))?;
    let culture = element
        .attribute("culture")
        .unwrap_or(INVARIANT_CULTURE)
        .to_owned();

    let mut nodes = element.children().filter(|n| n.is_element());
    let root = nodes
        .next()
        .ok_or_else(|| ReadError::Malformed("document has no root node".into()))?;
    let root = read_node(root)?;
    let definitions = nodes.map(read_node).collect::<Result<Vec<_>, _>>()?;

    Ok(Document {
        version,
        culture,
        root,
        definitions,
    })
}

fn read_node(element: roxmltree::Node<'_, '_>) -> Result<Node, ReadError> {
    let name = element
        .attribute(ATTR_NAME)
        .unwrap_or_else(|| element.tag_name().name())
        .to_owned();

    let id = parse_attr::<u32>(&element, ATTR_ID)?;
    let type_id = parse_attr::<u32>(&element, ATTR_TYPE_ID)?;
    let descriptor = element.attribute(ATTR_TYPE).map(|ty| {
        TypeDescriptor::new(ty, element.attribute(ATTR_MODULE).unwrap_or_default())
    });
    let ty = match (type_id, descriptor) {
        (Some(id), Some(descriptor)) => Some(TypeRef::Declared { id, descriptor }),
        (Some(id), None) => Some(TypeRef::Cached(id)),
        (None, Some(descriptor)) => Some(TypeRef::Inline(descriptor)),
        (None, None) => None,
    };

    let ranks = match element.attribute(ATTR_RANKS) {
        Some(text) => Some(
            text.split(',')
                .map(|r| r.trim().parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ReadError::Malformed(format!("bad {ATTR_RANKS} '{text}': {e}")))?,
        ),
        None => None,
    };

    let children = element
        .children()
        .filter(|n| n.is_element())
        .map(read_node)
        .collect::<Result<Vec<_>, _>>()?;

    let node = Node {
        name,
        id,
        ty,
        value: element.attribute(ATTR_VALUE).map(str::to_owned),
        children,
        has_type_cache: flag(&element, ATTR_TYPE_CACHE),
        deferred: flag(&element, ATTR_DEFERRED),
        resource_path: element.attribute(ATTR_RESOURCE_PATH).map(str::to_owned),
        builtin_id: parse_attr::<u32>(&element, ATTR_BUILTIN_ID)?,
        ranks,
    };
    if node.value.is_some() && !node.children.is_empty() {
        return Err(ReadError::Malformed(format!(
            "node '{}' has both a value and children",
            node.name
        )));
    }
    Ok(node)
}

fn flag(element: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    element
        .attribute(name)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn parse_attr<T: std::str::FromStr>(
    element: &roxmltree::Node<'_, '_>,
    name: &str,
) -> Result<Option<T>, ReadError>
where
    T::Err: std::fmt::Display,
{
    match element.attribute(name) {
        Some(text) => text
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ReadError::Malformed(format!("bad {name} '{text}': {e}"))),
        None => Ok(None),
    }
}

//! Scalar text formatting and culture-aware parsing.

use crate::descriptor::TypeDescriptor;
use crate::heap::Value;

/// Language prefixes whose cultures use a comma decimal separator.
const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "cs", "da", "de", "es", "fi", "fr", "id", "it", "nb", "nl", "pl", "pt", "ru", "sv", "tr", "uk",
];

/// Decimal separator used by a culture name such as `de-DE` or `en_US`.
pub(crate) fn decimal_separator(culture: &str) -> char {
    let language = culture
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if COMMA_DECIMAL_LANGUAGES.contains(&language.as_str()) {
        ','
    } else {
        '.'
    }
}

/// Descriptor and text of a scalar value. `None` for references and null.
pub(crate) fn format_scalar(value: &Value, separator: char) -> Option<(TypeDescriptor, String)> {
    let formatted = match value {
        Value::Bool(v) => (TypeDescriptor::boolean(), v.to_string()),
        Value::Int(v) => (TypeDescriptor::int(), v.to_string()),
        Value::UInt(v) => (TypeDescriptor::uint(), v.to_string()),
        Value::Float(v) => {
            let text = v.to_string();
            let text = if separator == '.' {
                text
            } else {
                text.replace('.', &separator.to_string())
            };
            (TypeDescriptor::float(), text)
        }
        // Code points keep NUL and control characters out of the markup.
        Value::Char(c) => (TypeDescriptor::character(), (*c as u32).to_string()),
        Value::Enum { ty, ordinal } => (ty.clone(), ordinal.to_string()),
        Value::Null | Value::Ref(_) => return None,
    };
    Some(formatted)
}

/// Parse the text of a core scalar node.
pub(crate) fn parse_scalar(ty: &TypeDescriptor, text: &str, separator: char) -> Option<Value> {
    let text = text.trim();
    match ty.name.as_str() {
        "bool" => text.parse().ok().map(Value::Bool),
        "i64" => text.parse().ok().map(Value::Int),
        "u64" => text.parse().ok().map(Value::UInt),
        "f64" => {
            let normalized = if separator == '.' {
                text.to_owned()
            } else {
                text.replace(separator, ".")
            };
            normalized.parse().ok().map(Value::Float)
        }
        "char" => text
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn culture_separators() {
        assert_eq!(decimal_separator("invariant"), '.');
        assert_eq!(decimal_separator("en-US"), '.');
        assert_eq!(decimal_separator("de-DE"), ',');
        assert_eq!(decimal_separator("fr_FR"), ',');
    }

    #[test]
    fn comma_culture_floats() {
        let (ty, text) = format_scalar(&Value::Float(1.5), ',').unwrap();
        assert_eq!(text, "1,5");
        assert_eq!(parse_scalar(&ty, &text, ','), Some(Value::Float(1.5)));
        assert_eq!(parse_scalar(&ty, "1.5", '.'), Some(Value::Float(1.5)));
    }

    #[test]
    fn chars_are_code_points() {
        let (ty, text) = format_scalar(&Value::Char('\0'), '.').unwrap();
        assert_eq!(text, "0");
        assert_eq!(parse_scalar(&ty, &text, '.'), Some(Value::Char('\0')));
    }

    #[test]
    fn bad_text_is_rejected() {
        assert_eq!(parse_scalar(&TypeDescriptor::int(), "twelve", '.'), None);
        assert_eq!(parse_scalar(&TypeDescriptor::string(), "x", '.'), None);
    }

    #[test]
    fn references_are_not_scalars() {
        assert!(format_scalar(&Value::Null, '.').is_none());
    }
}

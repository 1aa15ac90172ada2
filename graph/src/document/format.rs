//! Format-specific encoding and decoding of [`Document`]s.
//!
//! XML is always available. RON and bincode are feature-gated, exactly
//! like the component serialization formats.

use super::{xml, Document};
use crate::error::{ReadError, WriteError};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Attribute-bearing XML markup.
    Xml,
    /// RON (Rusty Object Notation) — human-readable text format.
    #[cfg(feature = "serialize-ron")]
    Ron,
    /// Bincode — compact binary format.
    #[cfg(feature = "serialize-bincode")]
    Bincode,
}

/// Encode a document to bytes in the given format.
pub fn encode(document: &Document, format: Format) -> Result<Vec<u8>, WriteError> {
    match format {
        Format::Xml => Ok(xml::to_xml(document).into_bytes()),
        #[cfg(feature = "serialize-ron")]
        Format::Ron => ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::default())
            .map(|s| s.into_bytes())
            .map_err(|e| WriteError::Format(e.to_string())),
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::serialize(document).map_err(|e| WriteError::Format(e.to_string()))
        }
    }
}

/// Decode bytes in the given format to a document.
pub fn decode(bytes: &[u8], format: Format) -> Result<Document, ReadError> {
    match format {
        Format::Xml => {
            let s = std::str::from_utf8(bytes).map_err(|e| ReadError::Format(e.to_string()))?;
            xml::from_xml(s)
        }
        #[cfg(feature = "serialize-ron")]
        Format::Ron => {
            let s = std::str::from_utf8(bytes).map_err(|e| ReadError::Format(e.to_string()))?;
            ron::from_str(s).map_err(|e| ReadError::Format(e.to_string()))
        }
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::deserialize(bytes).map_err(|e| ReadError::Format(e.to_string()))
        }
    }
}

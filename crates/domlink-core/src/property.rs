//! Property names a guest module may read or write on a node.
//!
//! The module addresses properties by string. Instead of reflecting on
//! arbitrary keys, every name is mapped onto a closed set here and anything
//! unknown is refused.

use std::fmt;
use std::str::FromStr;

use crate::error::DocumentError;

/// Content attributes that are reflected one-to-one.
const REFLECTED: &[&str] = &[
    "id",
    "value",
    "name",
    "type",
    "title",
    "href",
    "src",
    "alt",
    "placeholder",
    "style",
    "disabled",
    "checked",
    "hidden",
    "readonly",
    "tabindex",
    "role",
];

/// A node property the bridge knows how to apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Property {
    /// Text of all descendants (`textContent`, `innerText`).
    TextContent,
    /// A content attribute, stored under its canonical attribute name.
    Attribute(String),
}

impl Property {
    /// Attribute name backing this property, if any.
    pub fn attribute_name(&self) -> Option<&str> {
        match self {
            Property::TextContent => None,
            Property::Attribute(name) => Some(name),
        }
    }
}

impl FromStr for Property {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let property = match s {
            "textContent" | "innerText" => Property::TextContent,
            "className" | "class" => Property::Attribute("class".to_string()),
            "htmlFor" | "for" => Property::Attribute("for".to_string()),
            "readOnly" => Property::Attribute("readonly".to_string()),
            "tabIndex" => Property::Attribute("tabindex".to_string()),
            _ if REFLECTED.contains(&s) => Property::Attribute(s.to_string()),
            _ if is_custom_attribute(s) => Property::Attribute(s.to_ascii_lowercase()),
            _ => return Err(DocumentError::PropertyNotAllowed(s.to_string())),
        };
        Ok(property)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::TextContent => f.write_str("textContent"),
            Property::Attribute(name) => f.write_str(name),
        }
    }
}

/// `data-*` and `aria-*` names with a non-empty, plain suffix.
fn is_custom_attribute(name: &str) -> bool {
    let suffix = name
        .strip_prefix("data-")
        .or_else(|| name.strip_prefix("aria-"));
    match suffix {
        Some(rest) => {
            !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        }
        None => false,
    }
}

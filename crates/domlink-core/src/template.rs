//! Declarative page content used to seed a [`Document`](crate::Document).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocumentError, Result};

/// Initial content of `body`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTemplate {
    /// Top-level nodes appended to `body`, in order
    #[serde(default)]
    pub body: Vec<NodeTemplate>,
}

/// One node of a page template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeTemplate {
    /// A text node
    Text {
        /// Text data
        text: String,
    },
    /// An element with attributes and children
    Element {
        /// Tag name
        tag: String,
        /// Content attributes
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        /// Child nodes
        #[serde(default)]
        children: Vec<NodeTemplate>,
    },
}

impl PageTemplate {
    /// Parse a template from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DocumentError::Template(e.to_string()))
    }

    /// Read and parse a JSON template file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DocumentError::Template(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let page = PageTemplate::from_json(
            r#"{"body": [{"tag": "div", "children": [{"text": "x"}, {"tag": "span"}]}]}"#,
        )
        .unwrap();
        let NodeTemplate::Element { tag, children, attributes } = &page.body[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "div");
        assert!(attributes.is_empty());
        assert_eq!(children[0], NodeTemplate::Text { text: "x".into() });
    }

    #[test]
    fn test_empty_and_invalid() {
        assert_eq!(PageTemplate::from_json("{}").unwrap(), PageTemplate::default());
        assert!(matches!(
            PageTemplate::from_json(r#"{"body": [{"nope": 1}]}"#),
            Err(DocumentError::Template(_))
        ));
    }
}

//! Error types for the host document model.

use thiserror::Error;

use crate::document::NodeId;

/// Document error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Node id does not belong to this document
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Tag name is empty or contains characters outside `[A-Za-z0-9-]`
    #[error("invalid tag name: {0:?}")]
    InvalidTagName(String),

    /// Selector could not be parsed
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector {
        /// The selector text as received
        selector: String,
        /// What the parser choked on
        reason: String,
    },

    /// Insertion would produce an impossible tree
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// Operation needs an element but got a text or document node
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    /// Property name is not on the allow-list
    #[error("property not allowed: {0:?}")]
    PropertyNotAllowed(String),

    /// Page template could not be parsed
    #[error("template error: {0}")]
    Template(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

//! Diagnostic types for document extraction.
//!
//! Extraction never fails on an individual node. Anything it passes over is recorded here so
//! callers can see what was left out without scraping logs.

use serde::{Deserialize, Serialize};

/// An INSTANCE node whose component reference did not match any extracted component.
///
/// # Examples
///
/// ```
/// # use figparse_core::codec::UnmatchedReference;
/// let unmatched = UnmatchedReference {
///     node_id: "40:12".to_string(),
///     name: "Button / Primary".to_string(),
///     component_ref: "9:99".to_string(),
/// };
/// assert_eq!(unmatched.component_ref, "9:99");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedReference {
    /// Id of the INSTANCE node
    pub node_id: String,

    /// Name of the INSTANCE node
    pub name: String,

    /// The component id the node pointed at
    pub component_ref: String,
}

/// Diagnostic information produced during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParseDiagnostic {
    /// An instance that was not extracted because its component is unknown
    UnmatchedReference(UnmatchedReference),

    /// An INSTANCE node with no component reference at all
    MissingReference { node_id: String },

    /// Records sharing a node id with an earlier record were dropped
    Duplicates { kind: String, dropped: usize },

    /// A warning message about the extraction
    Warning(String),

    /// An informational message about the extraction
    Info(String),
}

impl ParseDiagnostic {
    /// Create a warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    /// Create an info diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    pub fn is_unmatched_reference(&self) -> bool {
        matches!(self, Self::UnmatchedReference(_))
    }

    pub fn as_unmatched_reference(&self) -> Option<&UnmatchedReference> {
        match self {
            Self::UnmatchedReference(unmatched) => Some(unmatched),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmatchedReference(unmatched) => write!(
                f,
                "Instance {} ({}) references unknown component {}",
                unmatched.node_id, unmatched.name, unmatched.component_ref
            ),
            Self::MissingReference { node_id } => {
                write!(f, "Instance {node_id} has no component reference")
            }
            Self::Duplicates { kind, dropped } => {
                write!(f, "Dropped {dropped} duplicate {kind} record(s)")
            }
            Self::Warning(msg) => write!(f, "Warning: {msg}"),
            Self::Info(msg) => write!(f, "Info: {msg}"),
        }
    }
}

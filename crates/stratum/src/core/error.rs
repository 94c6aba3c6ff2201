//! Core error types for model and layout processing
//!
//! `DiagramError` covers everything the model can refuse and everything a
//! layout can detect about its input. Trait boundaries (`Layout`,
//! `ModelListener`) use `anyhow::Result`; callers that need to tell error
//! kinds apart downcast to this type.

use thiserror::Error;

use crate::model::CellId;

/// Core error types for model and layout processing
#[derive(Error, Debug)]
pub enum DiagramError {
    #[error("Unknown cell: {id}")]
    UnknownCell { id: CellId },

    #[error("Invalid hierarchy: {message}")]
    InvalidHierarchy { message: String },

    #[error("Unbalanced transaction: end_update called without a matching begin_update")]
    UnbalancedTransaction,

    #[error("Structural error in layout of {cell}: {message}")]
    Structural { cell: CellId, message: String },

    #[error("Layout error: {message}")]
    LayoutError { message: String },

    #[error("Listener error: {message}")]
    ListenerError { message: String },
}

impl DiagramError {
    /// Create a new invalid hierarchy error
    pub fn invalid_hierarchy(message: impl Into<String>) -> Self {
        Self::InvalidHierarchy {
            message: message.into(),
        }
    }

    /// Create a new structural error for the layout of `cell`
    pub fn structural(cell: CellId, message: impl Into<String>) -> Self {
        Self::Structural {
            cell,
            message: message.into(),
        }
    }

    /// Create a new layout error
    pub fn layout_error(message: impl Into<String>) -> Self {
        Self::LayoutError {
            message: message.into(),
        }
    }

    /// Create a new listener error
    pub fn listener_error(message: impl Into<String>) -> Self {
        Self::ListenerError {
            message: message.into(),
        }
    }

    /// Returns true if this error only invalidates a single layout pass
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}

/// Returns true if `error` wraps a [`DiagramError::Structural`]
pub fn is_structural(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<DiagramError>()
        .is_some_and(DiagramError::is_structural)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_cell() {
        let error = DiagramError::UnknownCell { id: CellId(7) };
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Unknown cell"));
        assert!(error_msg.contains("#7"));
    }

    #[test]
    fn test_structural_error() {
        let error = DiagramError::structural(CellId(3), "edge without target");
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Structural error"));
        assert!(error_msg.contains("edge without target"));
        assert!(error.is_structural());
    }

    #[test]
    fn test_layout_error() {
        let error = DiagramError::layout_error("Layout failed");
        let error_msg = format!("{}", error);
        assert!(error_msg.contains("Layout error"));
        assert!(error_msg.contains("Layout failed"));
        assert!(!error.is_structural());
    }

    #[test]
    fn test_structural_detection_through_anyhow() {
        let structural: anyhow::Error = DiagramError::structural(CellId(1), "broken").into();
        let other: anyhow::Error = DiagramError::listener_error("boom").into();
        let foreign = anyhow::anyhow!("not ours");
        assert!(is_structural(&structural));
        assert!(!is_structural(&other));
        assert!(!is_structural(&foreign));
    }
}

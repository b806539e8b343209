//! Error types for stream-graph.
//!
//! Every failure here is local and synchronous: it is returned directly to the
//! caller and never retried internally. Overflow and underflow are not errors;
//! they show up in return counts and through the [`EventCallback`](crate::EventCallback)
//! side channel instead.

use crate::format::SampleFormat;

/// Errors returned by graph nodes and the connection protocol.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Two nodes with incompatible formats were connected and neither side conforms.
    ///
    /// Raised at connect time; no connection state is changed.
    #[error("format mismatch: output {output} cannot feed input {input}")]
    FormatMismatch {
        /// Format produced by the source side.
        output: SampleFormat,
        /// Format expected by the sink side.
        input: SampleFormat,
    },

    /// The node is past a terminal point for this operation.
    ///
    /// For example, reconnecting the input of a buffer that already reported
    /// end-of-stream.
    #[error("invalid state for '{node}': {reason}")]
    InvalidState {
        /// Name of the node that rejected the operation.
        node: String,
        /// What made the operation invalid.
        reason: String,
    },

    /// The node or one of its connection endpoints has been disposed.
    #[error("node '{node}' has been disposed")]
    Disposed {
        /// Name of the disposed node.
        node: String,
    },

    /// A numeric parameter was outside its allowed range.
    #[error("argument out of range: {reason}")]
    ArgumentOutOfRange {
        /// Which parameter and what range was expected.
        reason: String,
    },

    /// A parameter was malformed.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument.
        reason: String,
    },

    /// The node does not support this data-flow direction.
    #[error("'{node}' does not support {operation}")]
    Unsupported {
        /// Name of the node.
        node: String,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A cooperative cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// A node implementation failed while processing audio.
    #[error("node '{node}' failed: {reason}")]
    NodeFailed {
        /// Name of the failing node.
        node: String,
        /// Description of the failure.
        reason: String,
    },
}

impl GraphError {
    /// Creates an [`GraphError::InvalidState`] error.
    pub fn invalid_state(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`GraphError::Disposed`] error.
    pub fn disposed(node: impl Into<String>) -> Self {
        Self::Disposed { node: node.into() }
    }

    /// Creates an [`GraphError::ArgumentOutOfRange`] error.
    pub fn out_of_range(reason: impl Into<String>) -> Self {
        Self::ArgumentOutOfRange {
            reason: reason.into(),
        }
    }

    /// Creates an [`GraphError::InvalidArgument`] error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an [`GraphError::Unsupported`] error.
    pub fn unsupported(node: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            node: node.into(),
            operation,
        }
    }

    /// Creates a [`GraphError::NodeFailed`] error.
    pub fn node_failed(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NodeFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

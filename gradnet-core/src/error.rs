use thiserror::Error;

use crate::memory::MemStatus;
use crate::shape::{Axis, Shape};

/// Error type for graph construction and pass execution.
///
/// Structural errors are raised at node-construction time and abort the
/// construction; resource errors abort the current pass. Broken edge
/// invariants (a consumer not found among a node's inputs, a non-operation
/// consumer) are programmer errors and panic instead of returning a variant.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum GraphError {
    #[error("cannot broadcast shapes {shape1:?} and {shape2:?} in operation '{operation}'")]
    BroadcastError {
        shape1: Shape,
        shape2: Shape,
        operation: String,
    },

    #[error("shape mismatch: expected {expected:?}, got {actual:?} during {operation}")]
    ShapeMismatch {
        expected: Shape,
        actual: Shape,
        operation: String,
    },

    #[error("operation '{operation}' expects {expected} inputs, got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("operation '{operation}' has no inputs")]
    EmptyInputs { operation: String },

    #[error("concat along {axis:?}: {actual:?} does not match {expected:?} on the remaining axes")]
    ConcatMismatch {
        axis: Axis,
        expected: Shape,
        actual: Shape,
    },

    #[error("node name '{name}' is already taken")]
    DuplicateNodeName { name: String },

    #[error("tensor creation: data length {data_len} does not match shape {shape:?}")]
    TensorCreation { data_len: usize, shape: Shape },

    #[error("memory operation failed with {status:?} at node '{node}'")]
    Memory { status: MemStatus, node: String },
}

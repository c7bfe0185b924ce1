use std::fmt::Debug;

use crate::error::GraphError;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Contract every concrete operation implements. The graph engine never
/// inspects a kernel's internals: it validates shapes once at construction,
/// calls [`OpKernel::compute`] in forward order and
/// [`OpKernel::compute_gradient`] in backward order, treating both as pure
/// functions of the node's current inputs.
pub trait OpKernel: Debug {
    /// Short label used to auto-generate node names ("add", "concat", ...).
    fn label(&self) -> &'static str;

    /// Validates the input shapes and returns the output shape as seen at
    /// construction time. Arity, broadcast and axis mismatches reported here
    /// abort node construction.
    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape, GraphError>;

    /// Computes the output from the current input values. The output tensor
    /// is resized as needed, in particular along the batch axis.
    fn compute(&self, inputs: &[&Tensor], output: &mut Tensor) -> Result<(), GraphError>;

    /// Computes one gradient tensor per input from the accumulated output
    /// gradient. The returned order must match the declared input order.
    fn compute_gradient(
        &self,
        inputs: &[&Tensor],
        output_grad: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError>;
}

pub(crate) fn expect_arity(label: &str, actual: usize, expected: usize) -> Result<(), GraphError> {
    if actual != expected {
        return Err(GraphError::ArityMismatch { operation: label.to_string(), expected, actual });
    }
    Ok(())
}

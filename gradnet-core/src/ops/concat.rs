use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use crate::ops::kernel::OpKernel;
use crate::shape::{Axis, Shape};
use crate::tensor::Tensor;

/// Concatenation of any number of inputs along one axis. The remaining axes
/// must match across inputs; a mismatch is a construction-time error.
#[derive(Debug)]
pub struct ConcatKernel {
    axis: Axis,
}

impl ConcatKernel {
    pub fn new(axis: Axis) -> Self {
        ConcatKernel { axis }
    }

    fn check_shapes(&self, shapes: &[Shape]) -> Result<Shape, GraphError> {
        if shapes.is_empty() {
            return Err(GraphError::EmptyInputs { operation: self.label().to_string() });
        }
        let first = shapes[0];
        for &shape in &shapes[1..] {
            let same_elsewhere = Axis::ALL
                .iter()
                .filter(|&&a| a != self.axis)
                .all(|&a| shape.len(a) == first.len(a));
            if !same_elsewhere {
                return Err(GraphError::ConcatMismatch {
                    axis: self.axis,
                    expected: first,
                    actual: shape,
                });
            }
        }
        let total = shapes.iter().map(|s| s.len(self.axis)).sum();
        Ok(first.with_axis(self.axis, total))
    }
}

impl OpKernel for ConcatKernel {
    fn label(&self) -> &'static str {
        "concat"
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape, GraphError> {
        self.check_shapes(inputs)
    }

    fn compute(&self, inputs: &[&Tensor], output: &mut Tensor) -> Result<(), GraphError> {
        // batch extents can have changed since construction; re-validate
        let shapes: Vec<Shape> = inputs.iter().map(|t| t.shape()).collect();
        self.check_shapes(&shapes)?;
        *output = Tensor::concat(self.axis, inputs);
        Ok(())
    }

    fn compute_gradient(
        &self,
        inputs: &[&Tensor],
        output_grad: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        // the upstream gradient splits back into one slice per input
        let shapes: Vec<Shape> = inputs.iter().map(|t| t.shape()).collect();
        Ok(output_grad.split(self.axis, &shapes))
    }
}

/// Adds a node concatenating `xs` along `axis`.
pub fn concat_op(
    graph: &mut Graph,
    xs: &[NodeId],
    axis: Axis,
    name: Option<&str>,
) -> Result<NodeId, GraphError> {
    graph.operation(Box::new(ConcatKernel::new(axis)), xs, name)
}

#[cfg(test)]
#[path = "concat_test.rs"]
mod concat_test;

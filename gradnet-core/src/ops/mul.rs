use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use crate::ops::broadcast_zip;
use crate::ops::kernel::{expect_arity, OpKernel};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Elementwise multiplication with implicit broadcast on any size-1 axis.
#[derive(Debug)]
pub struct MulKernel;

impl OpKernel for MulKernel {
    fn label(&self) -> &'static str {
        "mul"
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape, GraphError> {
        expect_arity(self.label(), inputs.len(), 2)?;
        inputs[0].broadcast(inputs[1]).ok_or(GraphError::BroadcastError {
            shape1: inputs[0],
            shape2: inputs[1],
            operation: self.label().to_string(),
        })
    }

    fn compute(&self, inputs: &[&Tensor], output: &mut Tensor) -> Result<(), GraphError> {
        *output = broadcast_zip(self.label(), inputs[0], inputs[1], |a, b| a * b)?;
        Ok(())
    }

    fn compute_gradient(
        &self,
        inputs: &[&Tensor],
        output_grad: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        // d(a*b)/da = b and d(a*b)/db = a, each reduced to its operand shape
        let grad_a = broadcast_zip(self.label(), output_grad, inputs[1], |g, b| g * b)?;
        let grad_b = broadcast_zip(self.label(), output_grad, inputs[0], |g, a| g * a)?;
        Ok(vec![
            grad_a.reduce_to(inputs[0].shape()),
            grad_b.reduce_to(inputs[1].shape()),
        ])
    }
}

/// Adds an `a * b` node to the graph.
pub fn mul_op(
    graph: &mut Graph,
    a: NodeId,
    b: NodeId,
    name: Option<&str>,
) -> Result<NodeId, GraphError> {
    graph.operation(Box::new(MulKernel), &[a, b], name)
}

#[cfg(test)]
#[path = "mul_test.rs"]
mod mul_test;

use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use crate::ops::broadcast_zip;
use crate::ops::kernel::{expect_arity, OpKernel};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Elementwise subtraction with implicit broadcast on any size-1 axis.
#[derive(Debug)]
pub struct SubKernel;

impl OpKernel for SubKernel {
    fn label(&self) -> &'static str {
        "sub"
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
        *output = broadcast_zip(self.label(), inputs[0], inputs[1], |a, b| a - b)?;
        Ok(())
    }

    fn compute_gradient(
        &self,
        inputs: &[&Tensor],
        output_grad: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        Ok(vec![
            output_grad.reduce_to(inputs[0].shape()),
            output_grad.negated().reduce_to(inputs[1].shape()),
        ])
    }
}

/// Adds an `a - b` node to the graph.
pub fn sub_op(
    graph: &mut Graph,
    a: NodeId,
    b: NodeId,
    name: Option<&str>,
) -> Result<NodeId, GraphError> {
    graph.operation(Box::new(SubKernel), &[a, b], name)
}

#[cfg(test)]
#[path = "sub_test.rs"]
mod sub_test;

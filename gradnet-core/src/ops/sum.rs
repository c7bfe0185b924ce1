use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use crate::ops::kernel::{expect_arity, OpKernel};
use crate::shape::{Axis, Shape};
use crate::tensor::Tensor;

/// Sum reduction over one axis, or over all four axes when none is given.
#[derive(Debug)]
pub struct SumKernel {
    axis: Option<Axis>,
}

impl SumKernel {
    pub fn new(axis: Option<Axis>) -> Self {
        SumKernel { axis }
    }
}

impl OpKernel for SumKernel {
    fn label(&self) -> &'static str {
        "sum"
    }

    fn output_shape(&self, inputs: &[Shape]) -> Result<Shape, GraphError> {
        expect_arity(self.label(), inputs.len(), 1)?;
        Ok(match self.axis {
            Some(axis) => inputs[0].with_axis(axis, 1),
            None => Shape::new(1, 1, 1, 1),
        })
    }

    fn compute(&self, inputs: &[&Tensor], output: &mut Tensor) -> Result<(), GraphError> {
        *output = match self.axis {
            Some(axis) => inputs[0].sum_axis(axis),
            None => Tensor::filled(Shape::new(1, 1, 1, 1), inputs[0].sum()),
        };
        Ok(())
    }

    fn compute_gradient(
        &self,
        inputs: &[&Tensor],
        output_grad: &Tensor,
    ) -> Result<Vec<Tensor>, GraphError> {
        // every input element contributed once: the upstream gradient is
        // replicated back over the reduced axes
        Ok(vec![output_grad.broadcast_to(inputs[0].shape())])
    }
}

/// Adds a sum-reduction node to the graph.
pub fn sum_op(
    graph: &mut Graph,
    x: NodeId,
    axis: Option<Axis>,
    name: Option<&str>,
) -> Result<NodeId, GraphError> {
    graph.operation(Box::new(SumKernel::new(axis)), &[x], name)
}

#[cfg(test)]
#[path = "sum_test.rs"]
mod sum_test;

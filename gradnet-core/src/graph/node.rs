use crate::ops::OpKernel;
use crate::tensor::Tensor;

/// Stable handle to a node inside its owning [`Graph`](crate::Graph) arena.
///
/// Edges are stored as handle lists in both directions, so tearing a graph
/// down is a single arena free with no dangling back-pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Variant payload of a node. Traversals dispatch on capability (owns an
/// upstream computation, is trainable) rather than on concrete kernel types.
#[derive(Debug)]
pub enum NodeKind {
    Constant,
    Placeholder,
    Variable {
        trainable: bool,
    },
    Operation {
        kernel: Box<dyn OpKernel>,
        /// One gradient per input, produced by the kernel during the backward
        /// pass and released slot by slot as upstream nodes fold them in.
        input_grads: Vec<Option<Tensor>>,
        /// Step at which `input_grads` were produced.
        grads_step: u64,
    },
}

/// A vertex of the computation graph: one tensor value, one accumulated
/// gradient, fixed input edges and automatically maintained consumer
/// back-references.
#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) consumers: Vec<NodeId>,
    pub(crate) output: Tensor,
    pub(crate) output_grad: Tensor,
    pub(crate) last_compute_step: u64,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    pub fn consumers(&self) -> &[NodeId] {
        &self.consumers
    }

    pub fn output(&self) -> &Tensor {
        &self.output
    }

    pub fn output_grad(&self) -> &Tensor {
        &self.output_grad
    }

    /// Step counter value at which this node last executed; stale values mark
    /// branches skipped by runtime conditionals.
    pub fn last_compute_step(&self) -> u64 {
        self.last_compute_step
    }

    pub fn is_op(&self) -> bool {
        matches!(self.kind, NodeKind::Operation { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable { .. })
    }

    pub fn is_trainable(&self) -> bool {
        matches!(self.kind, NodeKind::Variable { trainable: true })
    }
}

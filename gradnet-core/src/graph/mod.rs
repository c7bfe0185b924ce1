//! The computation graph: an arena of nodes, the traversal-order builders and
//! the reverse-mode gradient engine.
//!
//! A [`Graph`] owns every node for its whole lifetime. Input edges are fixed
//! when a node is constructed (a node can only reference already-constructed
//! nodes, so cycles cannot form) and consumer back-references are maintained
//! automatically as the exact inverse of the input edges.

mod gradients;
mod node;
mod order;

use std::collections::HashMap;
use std::mem;

use log::trace;

pub use node::{Node, NodeId, NodeKind};

use crate::error::GraphError;
use crate::memory::ResidencyHooks;
use crate::ops::OpKernel;
use crate::shape::Shape;
use crate::tensor::Tensor;

pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
    pub(crate) step: u64,
    pub(crate) residency: Option<Box<dyn ResidencyHooks>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph { nodes: Vec::new(), names: HashMap::new(), step: 0, residency: None }
    }

    /// Installs the memory-residency collaborator driven during backward
    /// passes. Without hooks the engine computes as usual and issues no
    /// prefetch/release requests.
    pub fn set_residency_hooks(&mut self, hooks: Box<dyn ResidencyHooks>) {
        self.residency = Some(hooks);
    }

    /// The monotonically increasing pass counter. Incremented exactly once
    /// per forward pass.
    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Looks a node up by name, for tooling that binds persisted values to
    /// live nodes.
    pub fn get_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn output(&self, id: NodeId) -> &Tensor {
        &self.nodes[id.0].output
    }

    pub fn output_grad(&self, id: NodeId) -> &Tensor {
        &self.nodes[id.0].output_grad
    }

    /// Handles of all nodes, in construction order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// All trainable variables, in construction order.
    pub fn trainable_variables(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&id| self.nodes[id.0].is_trainable())
            .collect()
    }

    pub fn constant(&mut self, value: Tensor, name: Option<&str>) -> Result<NodeId, GraphError> {
        let shape = value.shape();
        self.add_node("const", name, NodeKind::Constant, Vec::new(), value, shape)
    }

    /// A node whose value is supplied externally each pass via
    /// [`Graph::set_placeholder`]. Starts out zero-filled.
    pub fn placeholder(&mut self, shape: Shape, name: Option<&str>) -> Result<NodeId, GraphError> {
        self.add_node("input", name, NodeKind::Placeholder, Vec::new(), Tensor::zeros(shape), shape)
    }

    /// A node holding owned, persistent state, trainable unless frozen.
    pub fn variable(
        &mut self,
        init: Tensor,
        trainable: bool,
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        let shape = init.shape();
        self.add_node("var", name, NodeKind::Variable { trainable }, Vec::new(), init, shape)
    }

    /// Adds an operation node computing its value from `inputs` through
    /// `kernel`. Structural problems (arity, broadcast or axis mismatches)
    /// abort construction here, before the node exists.
    pub fn operation(
        &mut self,
        kernel: Box<dyn OpKernel>,
        inputs: &[NodeId],
        name: Option<&str>,
    ) -> Result<NodeId, GraphError> {
        if inputs.is_empty() {
            return Err(GraphError::EmptyInputs { operation: kernel.label().to_string() });
        }
        let input_shapes: Vec<Shape> =
            inputs.iter().map(|&i| self.nodes[i.0].output.shape()).collect();
        let out_shape = kernel.output_shape(&input_shapes)?;

        let label = kernel.label();
        let kind = NodeKind::Operation {
            kernel,
            input_grads: vec![None; inputs.len()],
            grads_step: 0,
        };
        let id = self.add_node(label, name, kind, inputs.to_vec(), Tensor::zeros(out_shape), out_shape)?;
        for &input in inputs {
            self.nodes[input.0].consumers.push(id);
        }
        Ok(id)
    }

    fn add_node(
        &mut self,
        label: &str,
        explicit_name: Option<&str>,
        kind: NodeKind,
        inputs: Vec<NodeId>,
        output: Tensor,
        grad_shape: Shape,
    ) -> Result<NodeId, GraphError> {
        let name = match explicit_name {
            Some(name) => {
                if self.names.contains_key(name) {
                    return Err(GraphError::DuplicateNodeName { name: name.to_string() });
                }
                name.to_string()
            }
            None => self.generate_name(label),
        };
        let id = NodeId(self.nodes.len());
        self.names.insert(name.clone(), id);
        self.nodes.push(Node {
            name,
            kind,
            inputs,
            consumers: Vec::new(),
            output,
            output_grad: Tensor::zeros(grad_shape),
            last_compute_step: 0,
        });
        Ok(id)
    }

    fn generate_name(&self, label: &str) -> String {
        if !self.names.contains_key(label) {
            return label.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", label, n);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Feeds a placeholder for the next pass. The batch axis may differ from
    /// the declared shape; the remaining axes must match.
    pub fn set_placeholder(&mut self, id: NodeId, value: &Tensor) -> Result<(), GraphError> {
        let node = &mut self.nodes[id.0];
        assert!(
            matches!(node.kind, NodeKind::Placeholder),
            "node '{}' is not a placeholder",
            node.name
        );
        if !value.shape().matches_except_batch(node.output.shape()) {
            return Err(GraphError::ShapeMismatch {
                expected: node.output.shape(),
                actual: value.shape(),
                operation: format!("feed '{}'", node.name),
            });
        }
        value.copy_into(&mut node.output);
        Ok(())
    }

    /// Simultaneous access to a variable's value (mutably) and its gradient,
    /// the pair an optimizer update needs.
    pub fn variable_parts_mut(&mut self, id: NodeId) -> (&mut Tensor, &Tensor) {
        let node = &mut self.nodes[id.0];
        assert!(node.is_variable(), "node '{}' is not a variable", node.name);
        (&mut node.output, &node.output_grad)
    }

    /// Zero-fills the stored gradients of the given nodes.
    pub fn zero_grads(&mut self, ids: &[NodeId]) {
        for &id in ids {
            self.nodes[id.0].output_grad.zero();
        }
    }

    /// Executes one forward pass over the minimal subgraph producing
    /// `end_nodes`, bumping the step counter and stamping every executed
    /// operation with it.
    pub fn run(&mut self, end_nodes: &[NodeId]) -> Result<(), GraphError> {
        self.step += 1;
        let order = self.build_forward_order(end_nodes);
        trace!("forward pass {} over {} operations", self.step, order.len());

        for id in order {
            let mut output = mem::take(&mut self.nodes[id.0].output);
            let result = {
                let node = &self.nodes[id.0];
                let inputs: Vec<&Tensor> =
                    node.inputs.iter().map(|&i| &self.nodes[i.0].output).collect();
                let NodeKind::Operation { kernel, .. } = &node.kind else {
                    unreachable!("forward order contains only operations");
                };
                kernel.compute(&inputs, &mut output)
            };
            self.nodes[id.0].output = output;
            result?;
            self.nodes[id.0].last_compute_step = self.step;
        }
        Ok(())
    }
}

use std::mem;

use log::debug;

use crate::error::GraphError;
use crate::graph::{Graph, Node, NodeId, NodeKind};
use crate::memory::MemStatus;
use crate::tensor::Tensor;

impl Graph {
    /// Computes `output_grad` for every node the backward order visits and
    /// returns the trainable variables whose gradients were populated, in
    /// visit order. With an empty `params` set, gradients flow to all
    /// trainable variables; otherwise traversal is pruned to the requested
    /// subset.
    pub fn compute_gradients(
        &mut self,
        losses: &[NodeId],
        params: &[NodeId],
    ) -> Result<Vec<NodeId>, GraphError> {
        let order = self.build_backward_order(losses, params);
        self.compute_gradients_in_order(&order, params)
    }

    /// Backward pass over a prebuilt order; see [`Graph::compute_gradients`].
    pub fn compute_gradients_in_order(
        &mut self,
        order: &[NodeId],
        params: &[NodeId],
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut variables = Vec::new();

        for n in 0..order.len() {
            // overlap the next node's transfers with this node's compute
            if n + 1 < order.len() {
                self.prefetch_for(order[n + 1])?;
            }

            let id = order[n];
            debug!("computing gradient for '{}'", self.nodes[id.0].name);

            let node = &self.nodes[id.0];
            if node.is_trainable() && (params.is_empty() || params.contains(&id)) {
                variables.push(id);
            }

            // leaves that are not trainable never need a gradient buffer
            let skip = matches!(node.kind, NodeKind::Constant | NodeKind::Placeholder)
                && node.inputs.is_empty();

            if !skip {
                let contributions = self.accumulate_output_grad(id);

                // no contributing consumer means this is a root of the
                // backward pass: d(loss)/d(loss) = 1
                if contributions == 0 {
                    self.nodes[id.0].output_grad.fill(1.0);
                }

                // frozen parameters never need input gradients
                if matches!(self.nodes[id.0].kind, NodeKind::Variable { trainable: false }) {
                    continue;
                }

                if self.nodes[id.0].is_op() {
                    self.invoke_gradient_kernel(id)?;
                }
            }

            self.notify_grad_consumed(id)?;
        }

        Ok(variables)
    }

    /// Zero-resets the node's `output_grad`, sized to its current output, and
    /// folds in the gradient contribution of every consumer that executed
    /// this step and produced input gradients. Returns the number of
    /// contributions used.
    fn accumulate_output_grad(&mut self, id: NodeId) -> usize {
        let out_shape = self.nodes[id.0].output.shape();
        let mut grad = mem::take(&mut self.nodes[id.0].output_grad);
        grad.resize(out_shape);
        grad.zero();

        let mut contributions = 0;
        let consumers = self.nodes[id.0].consumers.clone();
        for consumer in consumers {
            let c = &self.nodes[consumer.0];
            let NodeKind::Operation { input_grads, grads_step, .. } = &c.kind else {
                panic!("consumer '{}' of '{}' is not an operation", c.name, self.nodes[id.0].name);
            };

            // a consumer that did not execute this step (a branch gated by a
            // runtime conditional) or whose gradients were never produced
            // (not required for the losses) contributes nothing
            if c.last_compute_step != self.step || *grads_step != self.step {
                continue;
            }

            let grad_wrt_node = if c.inputs.len() == 1 {
                input_grads[0].as_ref()
            } else {
                let index = c.inputs.iter().position(|&i| i == id).unwrap_or_else(|| {
                    panic!(
                        "node '{}' not found among the inputs of its consumer '{}'",
                        self.nodes[id.0].name, c.name
                    )
                });
                input_grads[index].as_ref()
            };

            if let Some(g) = grad_wrt_node {
                grad.add_assign_tensor(g);
                contributions += 1;
            }
        }

        self.nodes[id.0].output_grad = grad;
        contributions
    }

    /// Runs the operation's gradient contract against the accumulated output
    /// gradient, storing one gradient per input, indexed positionally.
    fn invoke_gradient_kernel(&mut self, id: NodeId) -> Result<(), GraphError> {
        let grads = {
            let node = &self.nodes[id.0];
            let NodeKind::Operation { kernel, .. } = &node.kind else {
                unreachable!("gradient kernel invoked on a non-operation");
            };
            let inputs: Vec<&Tensor> =
                node.inputs.iter().map(|&i| &self.nodes[i.0].output).collect();
            kernel.compute_gradient(&inputs, &node.output_grad)?
        };

        let step = self.step;
        let Node { name, kind, inputs, .. } = &mut self.nodes[id.0];
        let NodeKind::Operation { input_grads, grads_step, .. } = kind else {
            unreachable!();
        };
        assert_eq!(
            grads.len(),
            inputs.len(),
            "kernel of '{}' produced a gradient count mismatching its input count",
            name
        );
        *input_grads = grads.into_iter().map(Some).collect();
        *grads_step = step;
        Ok(())
    }

    /// Tells every consumer that this node has folded in its contribution:
    /// the consumer's per-input gradient buffer is dropped immediately and
    /// the residency collaborator is asked to reclaim the storage, keeping
    /// peak memory bounded instead of releasing everything at end-of-pass.
    fn notify_grad_consumed(&mut self, id: NodeId) -> Result<(), GraphError> {
        let consumers = self.nodes[id.0].consumers.clone();
        for consumer in consumers {
            let released = {
                let Node { name, kind, inputs, .. } = &mut self.nodes[consumer.0];
                let NodeKind::Operation { input_grads, .. } = kind else {
                    panic!("consumer '{}' is not an operation", name);
                };
                let index = inputs.iter().position(|&i| i == id).unwrap_or_else(|| {
                    panic!("node not found among the inputs of its consumer '{}'", name)
                });
                input_grads[index].take().map(|t| t.length() * mem::size_of::<f32>())
            };

            if let Some(bytes) = released {
                if let Some(hooks) = self.residency.as_mut() {
                    let name = &self.nodes[consumer.0].name;
                    let status = hooks.release(name, bytes);
                    if status != MemStatus::Success {
                        return Err(GraphError::Memory { status, node: name.clone() });
                    }
                }
            }
        }
        Ok(())
    }

    /// Issues residency requests for the node's output and its inputs'
    /// outputs, everything the gradient computation of that node will read.
    fn prefetch_for(&mut self, id: NodeId) -> Result<(), GraphError> {
        let Some(hooks) = self.residency.as_mut() else {
            return Ok(());
        };
        debug!("prefetching '{}'", self.nodes[id.0].name);

        let mut targets = Vec::with_capacity(1 + self.nodes[id.0].inputs.len());
        targets.push(id);
        targets.extend(self.nodes[id.0].inputs.iter().copied());

        for target in targets {
            let node = &self.nodes[target.0];
            let status = hooks.prefetch(&node.name, node.output.length() * mem::size_of::<f32>());
            if status != MemStatus::Success {
                return Err(GraphError::Memory { status, node: node.name.clone() });
            }
        }
        Ok(())
    }
}

use std::collections::HashSet;

use log::trace;

use crate::graph::{Graph, NodeId};

impl Graph {
    /// Topological order sufficient to compute every node in `end_nodes`:
    /// post-order depth-first traversal into input edges, guarded by a
    /// visited set so shared subexpressions are emitted once. Only operation
    /// nodes appear in the result; constants, placeholders and variables are
    /// traversed for ordering but need no execution. For a fixed graph and
    /// end-node list the order is fully deterministic (ties break by declared
    /// input order).
    pub fn build_forward_order(&self, end_nodes: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        for &id in end_nodes {
            self.process_forward_node(id, &mut order, &mut visited);
        }
        order
    }

    fn process_forward_node(
        &self,
        id: NodeId,
        order: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        for &input in &self.nodes[id.0].inputs {
            self.process_forward_node(input, order, visited);
        }
        if self.nodes[id.0].is_op() {
            order.push(id);
        }
    }

    /// Order in which nodes must be visited so that each node's output
    /// gradient is fully accumulated before it propagates further upstream.
    ///
    /// A node is appended only once every consumer that belongs to the
    /// `required` set (the forward-order closure of the end nodes) has been
    /// appended; consumers outside that set did not contribute to the losses
    /// and their missing gradients must not gate traversal. With a non-empty
    /// `params` set, traversal stops recursing upstream as soon as every
    /// requested parameter has been visited.
    pub fn build_backward_order(&self, end_nodes: &[NodeId], params: &[NodeId]) -> Vec<NodeId> {
        let required: HashSet<NodeId> = self.build_forward_order(end_nodes).into_iter().collect();

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visited_params = HashSet::new();
        for &id in end_nodes {
            self.process_backward_node(
                id,
                &mut order,
                params,
                &mut visited,
                &mut visited_params,
                &required,
            );
        }
        trace!("backward order covers {} of {} nodes", order.len(), self.nodes.len());
        order
    }

    fn process_backward_node(
        &self,
        id: NodeId,
        order: &mut Vec<NodeId>,
        params: &[NodeId],
        visited: &mut HashSet<NodeId>,
        visited_params: &mut HashSet<NodeId>,
        required: &HashSet<NodeId>,
    ) {
        if visited.contains(&id) {
            return;
        }

        // append as late as possible: every required consumer must already be
        // ordered so all contributions to this node's gradient exist by the
        // time the accumulation phase reaches it
        for &consumer in &self.nodes[id.0].consumers {
            debug_assert!(
                self.nodes[consumer.0].is_op(),
                "consumer '{}' of '{}' is not an operation",
                self.nodes[consumer.0].name,
                self.nodes[id.0].name
            );
            if !required.contains(&consumer) {
                continue;
            }
            if !visited.contains(&consumer) {
                return;
            }
        }

        visited.insert(id);
        order.push(id);

        // stop as soon as every requested parameter has been visited;
        // additional ancestors cannot affect any requested gradient
        if !params.is_empty() && self.nodes[id.0].is_variable() && params.contains(&id) {
            visited_params.insert(id);
            if visited_params.len() == params.len() {
                return;
            }
        }

        for &input in &self.nodes[id.0].inputs {
            self.process_backward_node(input, order, params, visited, visited_params, required);

            if !params.is_empty() && visited_params.len() == params.len() {
                return;
            }
        }
    }
}

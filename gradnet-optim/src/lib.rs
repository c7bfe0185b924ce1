//! Optimizers updating the trainable variables of a `gradnet` graph in place
//! from the gradients a backward pass populated.

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use gradnet_core::{Graph, NodeId};

/// An optimization algorithm.
///
/// `params` is the list of trainable variables to update, typically the list
/// returned by `Graph::compute_gradients`.
pub trait Optimizer {
    /// Applies one update step to every parameter from its stored gradient.
    fn step(&mut self, graph: &mut Graph, params: &[NodeId]);

    /// Clears the stored gradients of the parameters. Call before a backward
    /// pass when gradients must not carry over from the previous iteration.
    fn zero_grad(&self, graph: &mut Graph, params: &[NodeId]) {
        graph.zero_grads(params);
    }
}

use gradnet_core::{Graph, NodeId};

use crate::Optimizer;

/// Stochastic gradient descent: `p = p - lr * grad(p)`.
#[derive(Debug)]
pub struct Sgd {
    lr: f32,
}

impl Sgd {
    pub fn new(lr: f32) -> Self {
        assert!(lr >= 0.0, "learning rate must be non-negative");
        Sgd { lr }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, graph: &mut Graph, params: &[NodeId]) {
        for &param in params {
            let (value, grad) = graph.variable_parts_mut(param);
            for (v, g) in value.data_mut().iter_mut().zip(grad.data()) {
                *v -= self.lr * g;
            }
        }
    }
}

#[cfg(test)]
#[path = "sgd_test.rs"]
mod sgd_test;

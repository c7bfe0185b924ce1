use std::collections::HashMap;

use gradnet_core::{Graph, NodeId};
use log::trace;

use crate::Optimizer;

/// Adam (https://arxiv.org/abs/1412.6980) with bias-corrected first and
/// second moment estimates. Moment state is kept per parameter, keyed by the
/// parameter's node handle, and sized lazily on first update.
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    moments1: HashMap<NodeId, Vec<f32>>,
    moments2: HashMap<NodeId, Vec<f32>>,
}

impl Default for Adam {
    fn default() -> Self {
        Adam::new(0.001, 0.9, 0.999, 1e-8)
    }
}

impl Adam {
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        assert!(lr >= 0.0, "learning rate must be non-negative");
        assert!((0.0..1.0).contains(&beta1), "beta1 must be in [0, 1)");
        assert!((0.0..1.0).contains(&beta2), "beta2 must be in [0, 1)");
        Adam { lr, beta1, beta2, epsilon, t: 0, moments1: HashMap::new(), moments2: HashMap::new() }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, graph: &mut Graph, params: &[NodeId]) {
        self.t += 1;
        // fold both bias corrections into one effective rate, as in the
        // reference implementation
        let correction =
            (1.0 - self.beta2.powi(self.t as i32)).sqrt() / (1.0 - self.beta1.powi(self.t as i32));
        let lr_t = self.lr * correction;
        trace!("adam step {} with effective rate {}", self.t, lr_t);

        for &param in params {
            let (value, grad) = graph.variable_parts_mut(param);
            let n = value.length();
            let m = self.moments1.entry(param).or_insert_with(|| vec![0.0; n]);
            let v = self.moments2.entry(param).or_insert_with(|| vec![0.0; n]);
            assert_eq!(m.len(), n, "parameter changed length under the optimizer");

            for (((p, g), m), v) in
                value.data_mut().iter_mut().zip(grad.data()).zip(m.iter_mut()).zip(v.iter_mut())
            {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + self.epsilon);
            }
        }
    }
}

#[cfg(test)]
#[path = "adam_test.rs"]
mod adam_test;

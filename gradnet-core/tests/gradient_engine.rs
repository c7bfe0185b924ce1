use std::sync::{Arc, Mutex};

use gradnet_core::memory::{MemStatus, MemoryPool, PoolResidency, ResidencyHooks};
use gradnet_core::ops::{add_op, mul_op, sub_op, sum_op};
use gradnet_core::{Graph, GraphError, Shape, Tensor};

#[test]
fn output_grad_sums_every_consumer_contribution() {
    let mut g = Graph::new();
    let y = g.variable(Tensor::filled(Shape::whd(2, 1, 1), 1.0), true, Some("y")).unwrap();
    let two = g.constant(Tensor::filled(Shape::whd(2, 1, 1), 2.0), None).unwrap();
    let zero = g.constant(Tensor::zeros(Shape::whd(2, 1, 1)), None).unwrap();

    // three consumers contributing gradients 2, 1 and 1
    let t1 = mul_op(&mut g, y, two, None).unwrap();
    let t2 = add_op(&mut g, y, zero, None).unwrap();
    let t3 = sub_op(&mut g, y, zero, None).unwrap();
    let u = add_op(&mut g, t1, t2, None).unwrap();
    let v = add_op(&mut g, u, t3, None).unwrap();
    let loss = sum_op(&mut g, v, None, None).unwrap();

    g.run(&[loss]).unwrap();
    g.compute_gradients(&[loss], &[]).unwrap();
    assert_eq!(g.output_grad(y).data(), &[4.0, 4.0]);
}

#[test]
fn backward_roots_are_seeded_with_ones() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(3, 1, 1), 7.0), true, Some("x")).unwrap();
    let c = g.constant(Tensor::filled(Shape::whd(3, 1, 1), 2.0), None).unwrap();
    let y = mul_op(&mut g, x, c, None).unwrap();

    g.run(&[y]).unwrap();
    g.compute_gradients(&[y], &[]).unwrap();

    // y has no consumers: d(y)/d(y) = 1, of y's own shape
    assert_eq!(g.output_grad(y).shape(), Shape::whd(3, 1, 1));
    assert_eq!(g.output_grad(y).data(), &[1.0, 1.0, 1.0]);
}

#[test]
fn multiple_simultaneous_losses_accumulate() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 1.0), true, Some("x")).unwrap();
    let two = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 2.0), None).unwrap();
    let three = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 3.0), None).unwrap();
    let l1 = mul_op(&mut g, x, two, None).unwrap();
    let l2 = mul_op(&mut g, x, three, None).unwrap();

    g.run(&[l1, l2]).unwrap();
    g.compute_gradients(&[l1, l2], &[]).unwrap();

    // both end nodes are roots of the backward pass
    assert_eq!(g.output_grad(x).data(), &[5.0]);
}

// a consumer that did not execute during the current step is structurally
// present but must not contribute to gradient accumulation
#[test]
fn stale_consumers_do_not_contribute() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 1.0), true, Some("x")).unwrap();
    let two = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 2.0), None).unwrap();
    let three = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 3.0), None).unwrap();
    let a = mul_op(&mut g, x, two, Some("a")).unwrap();
    let b = mul_op(&mut g, x, three, Some("b")).unwrap();
    let la = sum_op(&mut g, a, None, Some("loss_a")).unwrap();
    let lb = sum_op(&mut g, b, None, Some("loss_b")).unwrap();

    // both branches execute: gradients add up
    g.run(&[la, lb]).unwrap();
    g.compute_gradients(&[la, lb], &[]).unwrap();
    assert_eq!(g.output_grad(x).data(), &[5.0]);

    // only branch a executes this step; b's step stamp is stale
    g.run(&[la]).unwrap();
    g.compute_gradients(&[la, lb], &[]).unwrap();
    assert_eq!(g.output_grad(x).data(), &[2.0]);
}

#[test]
fn frozen_variables_get_a_gradient_but_are_not_reported() {
    let mut g = Graph::new();
    let v = g.variable(Tensor::filled(Shape::whd(2, 1, 1), 1.0), false, Some("frozen")).unwrap();
    let c = g
        .constant(Tensor::from_vec(vec![4.0, 9.0], Shape::whd(2, 1, 1)).unwrap(), None)
        .unwrap();
    let y = mul_op(&mut g, v, c, None).unwrap();
    let loss = sum_op(&mut g, y, None, None).unwrap();

    g.run(&[loss]).unwrap();
    let vars = g.compute_gradients(&[loss], &[]).unwrap();
    assert!(vars.is_empty());
    // the gradient is still accumulated before propagation stops
    assert_eq!(g.output_grad(v).data(), &[4.0, 9.0]);
}

#[test]
fn target_set_filters_reported_variables() {
    let mut g = Graph::new();
    let w1 = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 1.0), true, Some("w1")).unwrap();
    let w2 = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 1.0), true, Some("w2")).unwrap();
    let s = add_op(&mut g, w1, w2, None).unwrap();
    let loss = sum_op(&mut g, s, None, None).unwrap();

    g.run(&[loss]).unwrap();
    let vars = g.compute_gradients(&[loss], &[w2]).unwrap();
    assert_eq!(vars, vec![w2]);
    assert_eq!(g.output_grad(w2).data(), &[1.0]);
}

#[test]
fn placeholders_resize_their_batch_per_pass() {
    let mut g = Graph::new();
    let input = g.placeholder(Shape::whd(2, 1, 1), Some("input")).unwrap();
    let w = g.variable(Tensor::filled(Shape::whd(2, 1, 1), 3.0), true, Some("w")).unwrap();
    let y = mul_op(&mut g, input, w, None).unwrap();

    g.set_placeholder(input, &Tensor::ones(Shape::new(2, 1, 1, 2))).unwrap();
    g.run(&[y]).unwrap();
    assert_eq!(g.output(y).shape(), Shape::new(2, 1, 1, 2));

    g.set_placeholder(input, &Tensor::ones(Shape::new(2, 1, 1, 5))).unwrap();
    g.run(&[y]).unwrap();
    assert_eq!(g.output(y).shape(), Shape::new(2, 1, 1, 5));

    // the non-batch axes are fixed
    let err = g.set_placeholder(input, &Tensor::ones(Shape::whd(3, 1, 1))).unwrap_err();
    assert!(matches!(err, GraphError::ShapeMismatch { .. }));
}

struct RecordingHooks {
    events: Arc<Mutex<Vec<String>>>,
}

impl ResidencyHooks for RecordingHooks {
    fn prefetch(&mut self, node: &str, _bytes: usize) -> MemStatus {
        self.events.lock().unwrap().push(format!("prefetch {}", node));
        MemStatus::Success
    }

    fn release(&mut self, node: &str, _bytes: usize) -> MemStatus {
        self.events.lock().unwrap().push(format!("release {}", node));
        MemStatus::Success
    }
}

#[test]
fn backward_pass_prefetches_ahead_and_releases_consumed_gradients() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 2.0), true, Some("x")).unwrap();
    let c = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 3.0), Some("c")).unwrap();
    let y = mul_op(&mut g, x, c, Some("y")).unwrap();
    let loss = sum_op(&mut g, y, None, Some("loss")).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    g.set_residency_hooks(Box::new(RecordingHooks { events: Arc::clone(&events) }));

    g.run(&[loss]).unwrap();
    g.compute_gradients(&[loss], &[]).unwrap();

    let events = events.lock().unwrap();
    // backward order is [loss, y, x, c]: everything after the first node is
    // prefetched one step ahead of its processing
    assert!(events.contains(&"prefetch y".to_string()));
    assert!(events.contains(&"prefetch x".to_string()));
    // y's gradient buffer for x is released once x has folded it in
    assert!(events.contains(&"release y".to_string()));
    let prefetch_y = events.iter().position(|e| e == "prefetch y").unwrap();
    let release_y = events.iter().position(|e| e == "release y").unwrap();
    assert!(prefetch_y < release_y);
}

struct FailingHooks;

impl ResidencyHooks for FailingHooks {
    fn prefetch(&mut self, _node: &str, _bytes: usize) -> MemStatus {
        MemStatus::OutOfMemory
    }

    fn release(&mut self, _node: &str, _bytes: usize) -> MemStatus {
        MemStatus::Success
    }
}

#[test]
fn allocator_failure_aborts_the_pass() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 2.0), true, Some("x")).unwrap();
    let c = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 3.0), None).unwrap();
    let y = mul_op(&mut g, x, c, None).unwrap();
    let loss = sum_op(&mut g, y, None, None).unwrap();

    g.set_residency_hooks(Box::new(FailingHooks));
    g.run(&[loss]).unwrap();

    let err = g.compute_gradients(&[loss], &[]).unwrap_err();
    assert!(matches!(err, GraphError::Memory { status: MemStatus::OutOfMemory, .. }));
}

#[test]
fn pool_backed_residency_frees_gradient_buffers_promptly() {
    let mut g = Graph::new();
    let x = g.variable(Tensor::filled(Shape::whd(4, 1, 1), 1.0), true, Some("x")).unwrap();
    let c = g.constant(Tensor::filled(Shape::whd(4, 1, 1), 2.0), None).unwrap();
    let y = mul_op(&mut g, x, c, None).unwrap();
    let loss = sum_op(&mut g, y, None, None).unwrap();

    g.set_residency_hooks(Box::new(PoolResidency::new(MemoryPool::new(1 << 16, false))));
    g.run(&[loss]).unwrap();
    g.compute_gradients(&[loss], &[]).unwrap();
}

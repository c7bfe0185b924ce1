use crate::error::GraphError;
use crate::graph::Graph;
use crate::ops::{add_op, sum_op};
use crate::shape::Shape;
use crate::tensor::Tensor;
use crate::test_utils::check_tensor_near;

#[test]
fn forward_with_broadcast() {
    let mut g = Graph::new();
    let a = g
        .constant(Tensor::from_vec(vec![1.0, 2.0, 3.0], Shape::whd(3, 1, 1)).unwrap(), Some("a"))
        .unwrap();
    let b = g.constant(Tensor::filled(Shape::whd(1, 1, 1), 10.0), Some("b")).unwrap();
    let c = add_op(&mut g, a, b, None).unwrap();

    g.run(&[c]).unwrap();
    check_tensor_near(g.output(c), Shape::whd(3, 1, 1), &[11.0, 12.0, 13.0], 1e-6);
}

#[test]
fn gradients_reduce_over_the_broadcast_axis() {
    let mut g = Graph::new();
    let a = g
        .variable(Tensor::from_vec(vec![1.0, 2.0, 3.0], Shape::whd(3, 1, 1)).unwrap(), true, Some("a"))
        .unwrap();
    let b = g.variable(Tensor::filled(Shape::whd(1, 1, 1), 10.0), true, Some("b")).unwrap();
    let c = add_op(&mut g, a, b, None).unwrap();
    let loss = sum_op(&mut g, c, None, Some("loss")).unwrap();

    g.run(&[loss]).unwrap();
    let vars = g.compute_gradients(&[loss], &[]).unwrap();
    assert_eq!(vars, vec![a, b]);

    check_tensor_near(g.output_grad(a), Shape::whd(3, 1, 1), &[1.0, 1.0, 1.0], 1e-6);
    // b was broadcast over width 3: its gradient sums three unit contributions
    check_tensor_near(g.output_grad(b), Shape::whd(1, 1, 1), &[3.0], 1e-6);
}

#[test]
fn conflicting_shapes_abort_construction() {
    let mut g = Graph::new();
    let a = g.constant(Tensor::zeros(Shape::whd(2, 1, 1)), None).unwrap();
    let b = g.constant(Tensor::zeros(Shape::whd(3, 1, 1)), None).unwrap();
    let err = add_op(&mut g, a, b, None).unwrap_err();
    assert_eq!(
        err,
        GraphError::BroadcastError {
            shape1: Shape::whd(2, 1, 1),
            shape2: Shape::whd(3, 1, 1),
            operation: "add".to_string(),
        }
    );
}

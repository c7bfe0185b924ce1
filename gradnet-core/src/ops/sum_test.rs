use crate::graph::Graph;
use crate::ops::sum_op;
use crate::shape::{Axis, Shape};
use crate::tensor::Tensor;
use crate::test_utils::check_tensor_near;

#[test]
fn axis_sum_forward_and_gradient() {
    let mut g = Graph::new();
    let x = g
        .variable(
            Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::whd(3, 2, 1)).unwrap(),
            true,
            Some("x"),
        )
        .unwrap();
    let s = sum_op(&mut g, x, Some(Axis::Width), None).unwrap();
    let loss = sum_op(&mut g, s, None, None).unwrap();

    g.run(&[loss]).unwrap();
    check_tensor_near(g.output(s), Shape::whd(1, 2, 1), &[6.0, 15.0], 1e-6);

    g.compute_gradients(&[loss], &[]).unwrap();
    check_tensor_near(g.output_grad(x), Shape::whd(3, 2, 1), &[1.0; 6], 1e-6);
}

#[test]
fn global_sum_gradient_is_all_ones() {
    let mut g = Graph::new();
    let x = g
        .variable(Tensor::filled(Shape::new(2, 2, 1, 3), 0.5), true, Some("x"))
        .unwrap();
    let loss = sum_op(&mut g, x, None, None).unwrap();

    g.run(&[loss]).unwrap();
    check_tensor_near(g.output(loss), Shape::new(1, 1, 1, 1), &[6.0], 1e-6);

    g.compute_gradients(&[loss], &[]).unwrap();
    check_tensor_near(g.output_grad(x), Shape::new(2, 2, 1, 3), &[1.0; 12], 1e-6);
}

#[test]
fn batch_axis_sum_scales_gradient_by_replication() {
    let mut g = Graph::new();
    let x = g
        .variable(
            Tensor::from_vec(vec![1.0, 2.0, 10.0, 20.0], Shape::new(2, 1, 1, 2)).unwrap(),
            true,
            Some("x"),
        )
        .unwrap();
    let s = sum_op(&mut g, x, Some(Axis::Batch), None).unwrap();
    let loss = sum_op(&mut g, s, None, None).unwrap();

    g.run(&[loss]).unwrap();
    check_tensor_near(g.output(s), Shape::whd(2, 1, 1), &[11.0, 22.0], 1e-6);

    g.compute_gradients(&[loss], &[]).unwrap();
    check_tensor_near(g.output_grad(x), Shape::new(2, 1, 1, 2), &[1.0; 4], 1e-6);
}

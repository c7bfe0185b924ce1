use crate::graph::Graph;
use crate::ops::{sub_op, sum_op};
use crate::shape::Shape;
use crate::tensor::Tensor;
use crate::test_utils::check_tensor_near;

// a has shape (1,3,1) and broadcasts over b's width of 2; the gradient with
// respect to a must come back width-summed.
#[test]
fn broadcast_subtraction_end_to_end() {
    let mut g = Graph::new();
    let a = g
        .variable(Tensor::filled(Shape::whd(1, 3, 1), 1.0), true, Some("a"))
        .unwrap();
    // width-fastest layout: rows (2,3) per height
    let b = g
        .variable(
            Tensor::from_vec(vec![2.0, 3.0, 2.0, 3.0, 2.0, 3.0], Shape::whd(2, 3, 1)).unwrap(),
            true,
            Some("b"),
        )
        .unwrap();
    let c = sub_op(&mut g, a, b, Some("c")).unwrap();
    let loss = sum_op(&mut g, c, None, Some("loss")).unwrap();

    g.run(&[loss]).unwrap();
    check_tensor_near(
        g.output(c),
        Shape::whd(2, 3, 1),
        &[-1.0, -2.0, -1.0, -2.0, -1.0, -2.0],
        1e-6,
    );

    let vars = g.compute_gradients(&[loss], &[]).unwrap();
    assert_eq!(vars, vec![a, b]);

    // each of the two width slots contributed -1 to a
    check_tensor_near(g.output_grad(a), Shape::whd(1, 3, 1), &[-2.0, -2.0, -2.0], 1e-6);
    check_tensor_near(g.output_grad(b), Shape::whd(2, 3, 1), &[-1.0; 6], 1e-6);
}

#[test]
fn same_shape_gradients_pass_through() {
    let mut g = Graph::new();
    let a = g.variable(Tensor::filled(Shape::whd(2, 2, 1), 5.0), true, None).unwrap();
    let b = g.variable(Tensor::filled(Shape::whd(2, 2, 1), 3.0), true, None).unwrap();
    let c = sub_op(&mut g, a, b, None).unwrap();
    let loss = sum_op(&mut g, c, None, None).unwrap();

    g.run(&[loss]).unwrap();
    g.compute_gradients(&[loss], &[]).unwrap();

    check_tensor_near(g.output_grad(a), Shape::whd(2, 2, 1), &[1.0; 4], 1e-6);
    check_tensor_near(g.output_grad(b), Shape::whd(2, 2, 1), &[-1.0; 4], 1e-6);
}

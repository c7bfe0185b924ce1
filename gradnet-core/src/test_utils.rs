//! Small helpers shared by unit and integration tests.

use crate::shape::Shape;
use crate::tensor::Tensor;

/// Asserts that a tensor has the expected shape and that every element is
/// within `tolerance` of the expected data.
pub fn check_tensor_near(actual: &Tensor, expected_shape: Shape, expected_data: &[f32], tolerance: f32) {
    assert_eq!(actual.shape(), expected_shape, "shape mismatch");
    assert_eq!(actual.data().len(), expected_data.len(), "data length mismatch");
    for (i, (a, e)) in actual.data().iter().zip(expected_data.iter()).enumerate() {
        let diff = (a - e).abs();
        if diff > tolerance {
            panic!(
                "data mismatch at index {}: actual={}, expected={}, diff={}, tolerance={}",
                i, a, e, diff, tolerance
            );
        }
    }
}

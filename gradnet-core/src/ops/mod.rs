pub mod add;
pub mod concat;
pub mod kernel;
pub mod mul;
pub mod sub;
pub mod sum;

pub use add::{add_op, AddKernel};
pub use concat::{concat_op, ConcatKernel};
pub use kernel::OpKernel;
pub use mul::{mul_op, MulKernel};
pub use sub::{sub_op, SubKernel};
pub use sum::{sum_op, SumKernel};

use crate::error::GraphError;
use crate::tensor::Tensor;

/// Broadcast-aware elementwise zip with a structural error carrying the
/// operation label, shared by the binary kernels.
pub(crate) fn broadcast_zip(
    label: &str,
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(f32, f32) -> f32,
) -> Result<Tensor, GraphError> {
    a.try_zip_broadcast(b, f).ok_or_else(|| GraphError::BroadcastError {
        shape1: a.shape(),
        shape2: b.shape(),
        operation: label.to_string(),
    })
}

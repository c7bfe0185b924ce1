//! gradnet-core: an explicit, user-built computation graph of tensor-producing
//! nodes with a reverse-mode gradient engine.
//!
//! A caller describes a numeric computation as a [`Graph`] of typed nodes
//! (constants, placeholders, variables and operations), runs forward passes
//! over the minimal subgraph producing the requested outputs, and derives
//! gradients of scalar losses with respect to any subset of trainable
//! variables. The engine handles topological forward ordering, the
//! constrained backward ordering, multi-consumer gradient accumulation,
//! broadcast-aware gradient reduction and step-versioned execution tracking;
//! numeric kernels stay behind the [`ops::OpKernel`] contract.

pub mod error;
pub mod graph;
pub mod memory;
pub mod ops;
pub mod shape;
pub mod tensor;
pub mod test_utils;

pub use error::GraphError;
pub use graph::{Graph, Node, NodeId, NodeKind};
pub use shape::{Axis, Shape};
pub use tensor::Tensor;

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::GraphError;
use crate::shape::{Axis, Shape};

/// Dense f32 tensor over the four logical axes (width, height, depth, batch),
/// width fastest-varying.
///
/// This is the value type the graph engine computes with. It stays
/// deliberately small: the engine only needs in-place mutation, batch
/// resizing, broadcast-aware elementwise zips and per-axis sum reductions.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor { shape: Shape::new(0, 0, 0, 0), data: Vec::new() }
    }
}

impl Tensor {
    pub fn zeros(shape: Shape) -> Self {
        Tensor { shape, data: vec![0.0; shape.length()] }
    }

    pub fn ones(shape: Shape) -> Self {
        Self::filled(shape, 1.0)
    }

    pub fn filled(shape: Shape, value: f32) -> Self {
        Tensor { shape, data: vec![value; shape.length()] }
    }

    pub fn from_vec(data: Vec<f32>, shape: Shape) -> Result<Self, GraphError> {
        if data.len() != shape.length() {
            return Err(GraphError::TensorCreation { data_len: data.len(), shape });
        }
        Ok(Tensor { shape, data })
    }

    /// Tensor with values drawn from a normal distribution, used by variable
    /// initializers.
    pub fn randn(shape: Shape, mean: f32, std_dev: f32) -> Self {
        let normal = Normal::new(mean, std_dev).expect("invalid normal distribution parameters");
        let mut rng = rand::thread_rng();
        let data = (0..shape.length()).map(|_| normal.sample(&mut rng)).collect();
        Tensor { shape, data }
    }

    /// Tensor with values drawn uniformly from `[low, high)`.
    pub fn rand_uniform(shape: Shape, low: f32, high: f32) -> Self {
        let mut rng = rand::thread_rng();
        let data = (0..shape.length()).map(|_| rng.gen_range(low..high)).collect();
        Tensor { shape, data }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self, axis: Axis) -> usize {
        self.shape.len(axis)
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn at(&self, w: usize, h: usize, d: usize, n: usize) -> f32 {
        self.data[self.shape.offset(w, h, d, n)]
    }

    pub fn set(&mut self, w: usize, h: usize, d: usize, n: usize, value: f32) {
        let offset = self.shape.offset(w, h, d, n);
        self.data[offset] = value;
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn zero(&mut self) {
        self.fill(0.0);
    }

    /// Adopts `shape`, reallocating a zeroed buffer when the element count
    /// changes. Contents are not preserved.
    pub fn resize(&mut self, shape: Shape) {
        if shape.length() != self.data.len() {
            self.data = vec![0.0; shape.length()];
        }
        self.shape = shape;
    }

    pub fn resize_batch(&mut self, batch: usize) {
        self.resize(self.shape.with_batch(batch));
    }

    /// Elementwise accumulation. Shapes must match exactly.
    pub fn add_assign_tensor(&mut self, other: &Tensor) {
        assert_eq!(
            self.shape, other.shape,
            "gradient accumulation requires matching shapes"
        );
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Tensor {
        Tensor { shape: self.shape, data: self.data.iter().map(|&v| f(v)).collect() }
    }

    pub fn negated(&self) -> Tensor {
        self.map(|v| -v)
    }

    /// Elementwise zip with implicit broadcast: a size-1 axis on either side
    /// is expanded to the peer's extent. Returns `None` when the shapes are
    /// not broadcast-compatible.
    pub fn try_zip_broadcast(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Option<Tensor> {
        let shape = self.shape.broadcast(other.shape)?;
        let mut out = Tensor::zeros(shape);
        for n in 0..shape.batch {
            for d in 0..shape.depth {
                for h in 0..shape.height {
                    for w in 0..shape.width {
                        let a = self.at_clamped(w, h, d, n);
                        let b = other.at_clamped(w, h, d, n);
                        out.set(w, h, d, n, f(a, b));
                    }
                }
            }
        }
        Some(out)
    }

    // Reads with each coordinate clamped to 0 on size-1 axes.
    fn at_clamped(&self, w: usize, h: usize, d: usize, n: usize) -> f32 {
        self.at(
            if self.shape.width == 1 { 0 } else { w },
            if self.shape.height == 1 { 0 } else { h },
            if self.shape.depth == 1 { 0 } else { d },
            if self.shape.batch == 1 { 0 } else { n },
        )
    }

    /// Expands size-1 axes of this tensor to the target extents.
    pub fn broadcast_to(&self, target: Shape) -> Tensor {
        for axis in Axis::ALL {
            assert!(
                self.len(axis) == target.len(axis) || self.len(axis) == 1,
                "cannot broadcast {:?} to {:?}",
                self.shape,
                target
            );
        }
        let mut out = Tensor::zeros(target);
        for n in 0..target.batch {
            for d in 0..target.depth {
                for h in 0..target.height {
                    for w in 0..target.width {
                        out.set(w, h, d, n, self.at_clamped(w, h, d, n));
                    }
                }
            }
        }
        out
    }

    /// Sums the given axis down to extent 1.
    pub fn sum_axis(&self, axis: Axis) -> Tensor {
        let mut out = Tensor::zeros(self.shape.with_axis(axis, 1));
        for n in 0..self.shape.batch {
            for d in 0..self.shape.depth {
                for h in 0..self.shape.height {
                    for w in 0..self.shape.width {
                        let mut c = [w, h, d, n];
                        c[axis.index()] = 0;
                        let offset = out.shape.offset(c[0], c[1], c[2], c[3]);
                        out.data[offset] += self.at(w, h, d, n);
                    }
                }
            }
        }
        out
    }

    pub fn sum(&self) -> f32 {
        self.data.iter().sum()
    }

    /// Broadcast-aware gradient reduction: any axis where this tensor has
    /// extent >1 while the target has extent 1 is sum-reduced, independently
    /// per axis, restoring the gradient to the operand's original shape.
    pub fn reduce_to(&self, target: Shape) -> Tensor {
        if self.shape == target {
            return self.clone();
        }
        let mut grad = self.clone();
        for axis in Axis::ALL {
            if grad.len(axis) != 1 && target.len(axis) == 1 {
                grad = grad.sum_axis(axis);
            }
        }
        debug_assert_eq!(grad.shape, target, "gradient reduction left a non-operand shape");
        grad
    }

    /// Copies this tensor into `dst`, resizing the destination's batch axis.
    /// The remaining axes must already match.
    pub fn copy_into(&self, dst: &mut Tensor) {
        assert!(
            self.shape.matches_except_batch(dst.shape),
            "copy between incompatible shapes {:?} and {:?}",
            self.shape,
            dst.shape
        );
        dst.resize(self.shape);
        dst.data.copy_from_slice(&self.data);
    }

    /// Concatenates the parts along `axis`. All other axes must match; the
    /// callers validate this at node-construction time.
    pub fn concat(axis: Axis, parts: &[&Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "concat of zero tensors");
        let mut shape = parts[0].shape;
        shape.set_len(axis, parts.iter().map(|p| p.len(axis)).sum());
        let mut out = Tensor::zeros(shape);
        let mut base = 0;
        for part in parts {
            for n in 0..part.shape.batch {
                for d in 0..part.shape.depth {
                    for h in 0..part.shape.height {
                        for w in 0..part.shape.width {
                            let mut c = [w, h, d, n];
                            c[axis.index()] += base;
                            out.set(c[0], c[1], c[2], c[3], part.at(w, h, d, n));
                        }
                    }
                }
            }
            base += part.len(axis);
        }
        out
    }

    /// Splits this tensor back into parts of the given shapes along `axis`;
    /// the inverse of [`Tensor::concat`].
    pub fn split(&self, axis: Axis, shapes: &[Shape]) -> Vec<Tensor> {
        debug_assert_eq!(
            shapes.iter().map(|s| s.len(axis)).sum::<usize>(),
            self.len(axis),
            "split extents do not cover the concatenated axis"
        );
        let mut parts = Vec::with_capacity(shapes.len());
        let mut base = 0;
        for &shape in shapes {
            let mut part = Tensor::zeros(shape);
            for n in 0..shape.batch {
                for d in 0..shape.depth {
                    for h in 0..shape.height {
                        for w in 0..shape.width {
                            let mut c = [w, h, d, n];
                            c[axis.index()] += base;
                            part.set(w, h, d, n, self.at(c[0], c[1], c[2], c[3]));
                        }
                    }
                }
            }
            base += shape.len(axis);
            parts.push(part);
        }
        parts
    }
}

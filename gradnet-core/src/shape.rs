/// The four logical tensor axes, fastest-varying first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Width,
    Height,
    Depth,
    Batch,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::Width, Axis::Height, Axis::Depth, Axis::Batch];

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::Width => 0,
            Axis::Height => 1,
            Axis::Depth => 2,
            Axis::Batch => 3,
        }
    }
}

/// Logical tensor shape in WHDN layout.
///
/// The batch axis is the only one expected to change between passes; the
/// remaining three are fixed when a node is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub batch: usize,
}

impl Shape {
    pub fn new(width: usize, height: usize, depth: usize, batch: usize) -> Self {
        Shape { width, height, depth, batch }
    }

    /// Shape with a batch of 1.
    pub fn whd(width: usize, height: usize, depth: usize) -> Self {
        Shape::new(width, height, depth, 1)
    }

    pub fn len(&self, axis: Axis) -> usize {
        match axis {
            Axis::Width => self.width,
            Axis::Height => self.height,
            Axis::Depth => self.depth,
            Axis::Batch => self.batch,
        }
    }

    pub fn set_len(&mut self, axis: Axis, extent: usize) {
        match axis {
            Axis::Width => self.width = extent,
            Axis::Height => self.height = extent,
            Axis::Depth => self.depth = extent,
            Axis::Batch => self.batch = extent,
        }
    }

    /// Total element count.
    pub fn length(&self) -> usize {
        self.width * self.height * self.depth * self.batch
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_axis(mut self, axis: Axis, extent: usize) -> Self {
        self.set_len(axis, extent);
        self
    }

    /// Per-axis broadcast of two shapes: extents must be equal or one of the
    /// two must be 1. Returns `None` when the shapes are incompatible.
    pub fn broadcast(self, other: Shape) -> Option<Shape> {
        let mut result = self;
        for axis in Axis::ALL {
            let a = self.len(axis);
            let b = other.len(axis);
            if a == b || b == 1 {
                result.set_len(axis, a);
            } else if a == 1 {
                result.set_len(axis, b);
            } else {
                return None;
            }
        }
        Some(result)
    }

    /// True when all axes except batch have equal extents.
    pub fn matches_except_batch(&self, other: Shape) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }

    pub(crate) fn offset(&self, w: usize, h: usize, d: usize, n: usize) -> usize {
        ((n * self.depth + d) * self.height + h) * self.width + w
    }
}

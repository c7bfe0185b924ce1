use gradnet_core::Tensor;

/// A source of batch data.
///
/// `load` fills one or more consecutive slots of a buffer set starting at
/// `start` and returns how many slots it filled. A loader may resize a slot's
/// batch axis before filling it; the preloader carries the new batch size
/// through to the destination tensors.
pub trait Loader: Send {
    fn load(&mut self, slots: &mut [Tensor], start: usize) -> usize;
}

impl<F> Loader for F
where
    F: FnMut(&mut [Tensor], usize) -> usize + Send,
{
    fn load(&mut self, slots: &mut [Tensor], start: usize) -> usize {
        self(slots, start)
    }
}

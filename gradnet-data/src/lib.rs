//! Data feeding for `gradnet` graphs: loader traits and a double-buffered,
//! optionally threaded preloader that keeps batch data ready ahead of the
//! forward pass.

pub mod loader;
pub mod preloader;

pub use loader::Loader;
pub use preloader::DataPreloader;

//! Filesystem side effects applied to encode destinations.

mod error;
mod fs_propagator;
mod traits;

pub use error::PropagatorError;
pub use fs_propagator::FsAttributePropagator;
pub use traits::AttributePropagator;

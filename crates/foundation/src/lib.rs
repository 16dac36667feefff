pub mod bounds;
pub mod math;

// Foundation crate: geographic math and small geometric primitives only.
pub use bounds::*;

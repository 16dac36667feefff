pub mod geo;
pub mod precision;
pub mod projection;
pub mod rotation;
pub mod vec;

pub use geo::*;
pub use precision::*;
pub use projection::*;
pub use rotation::*;
pub use vec::*;

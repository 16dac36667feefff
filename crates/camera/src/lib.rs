pub mod camera;
pub mod change;
pub mod error;
pub mod params;

pub use camera::*;
pub use change::*;
pub use error::*;
pub use params::*;

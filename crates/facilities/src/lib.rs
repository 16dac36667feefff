pub mod cache;
pub mod error;
pub mod lookup;
pub mod source;
pub mod waypoint;

pub use cache::*;
pub use error::*;
pub use lookup::*;
pub use source::*;
pub use waypoint::*;

pub mod budget;
pub mod debounce;
pub mod frame;
pub mod listeners;
pub mod work_queue;

pub use budget::*;
pub use debounce::*;
pub use frame::*;
pub use listeners::*;
pub use work_queue::*;

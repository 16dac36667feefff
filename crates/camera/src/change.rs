use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Which camera quantities changed during one `set`.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChangeFlags: u32 {
        const TARGET = 1 << 0;
        const CENTER = 1 << 1;
        const TARGET_PROJECTED = 1 << 2;
        const RANGE = 1 << 3;
        const RANGE_ENDPOINTS = 1 << 4;
        const SCALE_FACTOR = 1 << 5;
        const ROTATION = 1 << 6;
        const PROJECTED_SIZE = 1 << 7;
        const PROJECTED_RESOLUTION = 1 << 8;
    }
}

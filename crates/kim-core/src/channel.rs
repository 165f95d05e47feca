//! Channel addressing for four-channel inertial motor controllers.

use serde::{Deserialize, Serialize};

/// Number of independently addressable channels per controller.
///
/// The K-Cube inertial motor drivers this server targets expose exactly
/// four piezo channels; the count is fixed, not configurable.
pub const CHANNEL_COUNT: usize = 4;

/// One of the four motor channels on a controller, numbered 1 through 4
/// as the hardware numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(u8);

impl Channel {
    /// All channels in hardware order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel(1), Channel(2), Channel(3), Channel(4)];

    /// Create a channel from its hardware index (1-4).
    ///
    /// Returns `None` for indices outside the fixed channel range.
    pub fn new(index: u8) -> Option<Self> {
        if (1..=CHANNEL_COUNT as u8).contains(&index) {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Hardware index of this channel (1-4).
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Zero-based offset, for indexing position arrays.
    pub fn offset(&self) -> usize {
        usize::from(self.0) - 1
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

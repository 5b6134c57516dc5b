use serde::{Deserialize, Serialize};

/// A room/rate offer returned for one trial stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBlock {
    pub room_name: String,
    pub max_occupancy: u32,
    /// Price for the whole trial stay, not per night.
    pub total_price: f64,
    pub currency: String,
}

/// Result of inspecting one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAvailability {
    /// `false` when the platform explicitly reports no rooms for the stay.
    pub rooms_found: bool,
    /// Blocks meeting the occupancy constraint, cheapest first.
    pub eligible_blocks: Vec<RateBlock>,
}

impl PageAvailability {
    pub fn no_rooms() -> Self {
        Self {
            rooms_found: false,
            eligible_blocks: Vec::new(),
        }
    }

    /// Keep blocks sleeping at least `min_occupancy` guests and sort by total price.
    pub fn from_blocks(blocks: Vec<RateBlock>, min_occupancy: u32) -> Self {
        let mut eligible: Vec<RateBlock> = blocks
            .into_iter()
            .filter(|b| b.max_occupancy >= min_occupancy)
            .filter(|b| b.total_price.is_finite() && b.total_price > 0.0)
            .collect();
        eligible.sort_by(|a, b| a.total_price.total_cmp(&b.total_price));
        Self {
            rooms_found: true,
            eligible_blocks: eligible,
        }
    }

    pub fn cheapest(&self) -> Option<&RateBlock> {
        self.eligible_blocks.first()
    }

    pub fn has_price(&self) -> bool {
        !self.eligible_blocks.is_empty()
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::PlayerId;

const DEFAULT_STARTING_LIFE_POINTS: i32 = 8000;
const DEFAULT_DECK_SIZE: usize = 20;
const DEFAULT_HAND_SIZE: usize = 5;

/// 对局参数。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelConfig {
    #[serde(default = "default_starting_life_points")]
    pub starting_life_points: i32,
    #[serde(default = "default_deck_size")]
    pub deck_size: usize,
    /// 起手张数，也是回合开始时补到的手牌数。
    #[serde(default = "default_hand_size")]
    pub hand_size: usize,
}

fn default_starting_life_points() -> i32 {
    DEFAULT_STARTING_LIFE_POINTS
}

fn default_deck_size() -> usize {
    DEFAULT_DECK_SIZE
}

fn default_hand_size() -> usize {
    DEFAULT_HAND_SIZE
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            starting_life_points: DEFAULT_STARTING_LIFE_POINTS,
            deck_size: DEFAULT_DECK_SIZE,
            hand_size: DEFAULT_HAND_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum SetupError {
    #[error("player {player} deck has {actual} cards, {required} required")]
    DeckTooSmall {
        player: PlayerId,
        required: usize,
        actual: usize,
    },
    #[error("card {card_id} is not in the catalog")]
    UnknownCard { card_id: u32 },
}

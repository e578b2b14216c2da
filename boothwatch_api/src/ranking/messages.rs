use boothwatch_core::RankingUpdate;
use serde::Deserialize;
use serde_json::json;

use crate::ApiResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedMessage {
    Pong,
    Leaderboard(LeaderboardUpdate),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaderboardUpdate {
    Single(RankingUpdate),
    Batch(Vec<RankingUpdate>),
}

impl LeaderboardUpdate {
    pub fn as_slice(&self) -> &[RankingUpdate] {
        match self {
            Self::Single(update) => std::slice::from_ref(update),
            Self::Batch(updates) => updates,
        }
    }
}

impl FeedMessage {
    pub fn decode(raw: &str) -> ApiResult<Self> {
        let message = match serde_json::from_str::<RawFeedMessage>(raw)? {
            RawFeedMessage::Control(ControlMessage::Pong) => Self::Pong,
            RawFeedMessage::Single(update) => Self::Leaderboard(LeaderboardUpdate::Single(update)),
            RawFeedMessage::Batch(updates) => Self::Leaderboard(LeaderboardUpdate::Batch(updates)),
        };
        Ok(message)
    }
}

pub fn ping_message() -> String {
    json!({"type": "ping"}).to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFeedMessage {
    Control(ControlMessage),
    Single(RankingUpdate),
    Batch(Vec<RankingUpdate>),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ControlMessage {
    Pong,
}

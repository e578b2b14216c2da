mod client;
mod feed;
mod messages;

use async_trait::async_trait;
use boothwatch_core::RankingEntry;

use crate::ApiResult;

pub use client::{ConnectionState, LiveRankingClient};
pub use feed::{FeedConnector, FeedSocket, TungsteniteConnector, TungsteniteSocket};
pub use messages::{FeedMessage, LeaderboardUpdate, ping_message};

/// Source of the leaderboard snapshot installed before the feed opens.
#[async_trait]
pub trait RankingSnapshotSource {
    async fn fetch_ranking(&self, path: &str) -> ApiResult<Vec<RankingEntry>>;
}

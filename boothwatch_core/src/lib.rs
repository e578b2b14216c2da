pub mod ids;
pub mod ranking;
pub mod time;

pub use ids::BoothId;
pub use ranking::{
    DEFAULT_SERIES_CAPACITY, Leaderboard, RankingEntry, RankingUpdate, SalesPoint, SalesSeries,
};
pub use time::{Timestamp, TimestampParseError};

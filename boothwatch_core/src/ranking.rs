use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{ids::BoothId, time::Timestamp};

pub const DEFAULT_SERIES_CAPACITY: usize = 500;

/// One row of the booth sales leaderboard.
///
/// `rank` is 1-based and always reflects the entry's position after the most
/// recent sort; any rank carried by a snapshot payload is overwritten.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    #[serde(default)]
    pub rank: u32,
    pub id: BoothId,
    pub name: String,
    pub total_sales: u64,
}

/// A sales total reported by the live feed for a single booth.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankingUpdate {
    pub id: BoothId,
    pub total_sales: u64,
    pub time_stamp: Timestamp,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesPoint {
    pub time: Timestamp,
    pub sales: u64,
}

/// Bounded history of sales totals for one booth. Oldest points are evicted
/// once `capacity` is reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SalesSeries {
    points: VecDeque<SalesPoint>,
    capacity: usize,
}

impl SalesSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn push(&mut self, point: SalesPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&SalesPoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SalesPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<SalesPoint> {
        self.points.iter().copied().collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaderboard {
    entries: Vec<RankingEntry>,
    series: HashMap<BoothId, SalesSeries>,
    series_capacity: usize,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl Leaderboard {
    pub fn new(series_capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            series: HashMap::new(),
            series_capacity: series_capacity.max(1),
        }
    }

    /// Installs a full leaderboard, keeping one entry per booth id (the last
    /// occurrence wins). Existing sales series are retained.
    pub fn replace_snapshot(&mut self, snapshot: Vec<RankingEntry>) {
        let mut last_index_by_id = HashMap::with_capacity(snapshot.len());
        for (index, entry) in snapshot.iter().enumerate() {
            last_index_by_id.insert(entry.id, index);
        }

        self.entries = snapshot
            .into_iter()
            .enumerate()
            .filter(|(index, entry)| last_index_by_id.get(&entry.id) == Some(index))
            .map(|(_, entry)| entry)
            .collect();
        self.sort_and_rank();
    }

    /// Applies every update of one feed message, then re-sorts once.
    ///
    /// Updates for booths that are not on the board are ignored. Returns the
    /// number of distinct booths whose totals were overwritten.
    pub fn apply_updates(&mut self, updates: &[RankingUpdate]) -> usize {
        let mut touched = HashSet::new();

        for update in updates {
            let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == update.id) else {
                continue;
            };

            entry.total_sales = update.total_sales;
            touched.insert(update.id);

            let capacity = self.series_capacity;
            self.series
                .entry(update.id)
                .or_insert_with(|| SalesSeries::with_capacity(capacity))
                .push(SalesPoint {
                    time: update.time_stamp,
                    sales: update.total_sales,
                });
        }

        self.sort_and_rank();
        touched.len()
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn top(&self, limit: usize) -> &[RankingEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }

    pub fn get(&self, id: BoothId) -> Option<&RankingEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn series(&self, id: BoothId) -> Option<&SalesSeries> {
        self.series.get(&id)
    }

    pub fn series_capacity(&self) -> usize {
        self.series_capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // `sort_by` is stable, so equal totals keep their previous relative order.
    fn sort_and_rank(&mut self) {
        self.entries
            .sort_by(|left, right| right.total_sales.cmp(&left.total_sales));
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Leaderboard, RankingEntry, RankingUpdate, SalesPoint, SalesSeries};
    use crate::{ids::BoothId, time::Timestamp};

    fn entry(id: u64, name: &str, total_sales: u64) -> RankingEntry {
        RankingEntry {
            rank: 0,
            id: BoothId(id),
            name: name.to_owned(),
            total_sales,
        }
    }

    fn update(id: u64, total_sales: u64, epoch_secs: i64) -> RankingUpdate {
        RankingUpdate {
            id: BoothId(id),
            total_sales,
            time_stamp: ts(epoch_secs),
        }
    }

    fn ids(board: &Leaderboard) -> Vec<u64> {
        board.entries().iter().map(|entry| entry.id.0).collect()
    }

    #[test]
    fn snapshot_is_sorted_and_ranked() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![
            entry(1, "Tteokbokki", 3_000),
            entry(2, "Hotteok", 9_000),
            entry(3, "Sikhye", 5_000),
        ]);

        assert_eq!(ids(&board), vec![2, 3, 1]);
        let ranks: Vec<u32> = board.entries().iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_keeps_one_entry_per_id() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![
            entry(1, "stale", 100),
            entry(2, "Hotteok", 200),
            entry(1, "fresh", 300),
        ]);

        assert_eq!(board.len(), 2);
        let booth = board.get(BoothId(1)).expect("booth 1");
        assert_eq!(booth.name, "fresh");
        assert_eq!(booth.total_sales, 300);
    }

    #[test]
    fn update_overwrites_total_and_appends_point() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![entry(7, "Corn Dogs", 500), entry(8, "Lemonade", 9_000)]);

        let stamp = Timestamp::parse_rfc3339("2024-01-01T00:00:00Z").expect("timestamp");
        let applied = board.apply_updates(&[RankingUpdate {
            id: BoothId(7),
            total_sales: 12_000,
            time_stamp: stamp,
        }]);

        assert_eq!(applied, 1);
        assert_eq!(ids(&board), vec![7, 8]);
        assert_eq!(board.get(BoothId(7)).expect("booth 7").total_sales, 12_000);
        assert_eq!(
            board.series(BoothId(7)).expect("series").to_vec(),
            vec![SalesPoint {
                time: stamp,
                sales: 12_000
            }]
        );
    }

    #[test]
    fn untouched_entries_keep_totals_and_ties_stay_stable() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![
            entry(1, "A", 400),
            entry(2, "B", 300),
            entry(3, "C", 200),
            entry(4, "D", 100),
        ]);

        board.apply_updates(&[update(4, 300, 10)]);

        assert_eq!(ids(&board), vec![1, 2, 4, 3]);
        assert_eq!(board.get(BoothId(1)).expect("booth").total_sales, 400);
        assert_eq!(board.get(BoothId(3)).expect("booth").total_sales, 200);
        assert!(board.series(BoothId(1)).is_none());
    }

    #[test]
    fn batch_is_applied_before_single_resort() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![entry(1, "A", 10), entry(2, "B", 20), entry(3, "C", 30)]);

        let applied = board.apply_updates(&[update(1, 50, 1), update(3, 5, 1), update(1, 60, 2)]);

        assert_eq!(applied, 2);
        assert_eq!(ids(&board), vec![1, 2, 3]);
        assert_eq!(board.series(BoothId(1)).expect("series").len(), 2);
        assert_eq!(board.entries()[0].rank, 1);
    }

    #[test]
    fn unknown_booths_are_ignored() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![entry(1, "A", 10)]);

        let applied = board.apply_updates(&[update(99, 1_000, 1)]);

        assert_eq!(applied, 0);
        assert_eq!(board.len(), 1);
        assert!(board.series(BoothId(99)).is_none());
    }

    #[test]
    fn series_evicts_oldest_points_when_full() {
        let mut series = SalesSeries::with_capacity(3);
        for sales in 1..=5 {
            series.push(SalesPoint {
                time: ts(sales as i64),
                sales,
            });
        }

        let sales: Vec<u64> = series.iter().map(|point| point.sales).collect();
        assert_eq!(sales, vec![3, 4, 5]);
        assert_eq!(series.latest().map(|point| point.sales), Some(5));
    }

    #[test]
    fn board_series_respects_configured_capacity() {
        let mut board = Leaderboard::new(2);
        board.replace_snapshot(vec![entry(1, "A", 0)]);
        for step in 1..=4 {
            board.apply_updates(&[update(1, step * 10, step as i64)]);
        }

        let series = board.series(BoothId(1)).expect("series");
        assert_eq!(series.len(), 2);
        assert_eq!(series.capacity(), 2);
        assert_eq!(series.latest().map(|point| point.sales), Some(40));
    }

    #[test]
    fn top_clamps_to_board_length() {
        let mut board = Leaderboard::default();
        board.replace_snapshot(vec![entry(1, "A", 10), entry(2, "B", 20)]);

        assert_eq!(board.top(1).len(), 1);
        assert_eq!(board.top(10).len(), 2);
    }

    fn ts(epoch_secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(epoch_secs).expect("valid epoch seconds")
    }
}

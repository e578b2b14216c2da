use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU32, AtomicU64, Ordering},
};

use boothwatch_core::{BoothId, Leaderboard, RankingEntry, SalesPoint};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};
use url::Url;

use super::{
    RankingSnapshotSource,
    feed::{FeedConnector, FeedSocket},
    messages::{FeedMessage, ping_message},
};
use crate::{
    ApiResult,
    config::{ApiConfig, RankingConfig},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

struct FeedShared {
    board: watch::Sender<Leaderboard>,
    state: watch::Sender<ConnectionState>,
    reconnect_attempts: AtomicU32,
    generation: AtomicU64,
}

impl FeedShared {
    /// Hands the state over to a new feed task. State writes tagged with an
    /// older generation are dropped from here on.
    fn begin_generation(&self) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = ConnectionState::Connecting;
        });
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    // The generation check runs under the channel's write lock, so it cannot
    // interleave with `begin_generation`.
    fn set_state(&self, generation: u64, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if !self.is_current(generation) || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

struct FeedTask {
    generation: u64,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FeedTask {
    fn abort(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

/// Live booth sales leaderboard fed by the ranking WebSocket.
///
/// The connection runs on a background task that keeps the socket alive
/// with pings and reconnects after involuntary closes, up to
/// `max_reconnect_attempts` consecutive failures. After that it stays
/// [`ConnectionState::Disconnected`] until [`LiveRankingClient::connect`]
/// is called again.
pub struct LiveRankingClient<F>
where
    F: FeedConnector,
{
    connector: Arc<F>,
    api: ApiConfig,
    config: RankingConfig,
    shared: Arc<FeedShared>,
    task: Mutex<Option<FeedTask>>,
}

impl<F> LiveRankingClient<F>
where
    F: FeedConnector,
{
    pub fn new(connector: Arc<F>, api: ApiConfig, config: RankingConfig) -> Self {
        let shared = FeedShared {
            board: watch::channel(Leaderboard::new(config.series_capacity)).0,
            state: watch::channel(ConnectionState::Disconnected).0,
            reconnect_attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
        };

        Self {
            connector,
            api,
            config,
            shared: Arc::new(shared),
            task: Mutex::new(None),
        }
    }

    /// Installs the leaderboard snapshot from `source`, then opens the feed.
    /// The feed is not opened when the snapshot cannot be fetched.
    pub async fn start<P>(&self, source: &P) -> ApiResult<()>
    where
        P: RankingSnapshotSource + ?Sized,
    {
        let snapshot = source.fetch_ranking(&self.config.snapshot_path).await?;
        log::info!("installed ranking snapshot with {} booths", snapshot.len());
        self.shared
            .board
            .send_modify(|board| board.replace_snapshot(snapshot));
        self.connect();
        Ok(())
    }

    /// Opens the feed on a background task. Does nothing while a connection
    /// is open or being established. Must be called within a tokio runtime.
    pub fn connect(&self) {
        let mut task = self.lock_task();
        let state = self.shared.state();
        if matches!(state, ConnectionState::Open | ConnectionState::Connecting) {
            log::debug!("ranking feed already {state:?}; ignoring connect");
            return;
        }

        let url = match self.api.websocket_url(&self.config.feed_path) {
            Ok(url) => url,
            Err(err) => {
                log::error!(
                    "cannot build ranking feed socket: {:?}",
                    err.display_chain()
                );
                return;
            }
        };

        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = self.shared.begin_generation();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(feed_loop(
            Arc::clone(&self.connector),
            url,
            self.config.clone(),
            Arc::clone(&self.shared),
            generation,
            shutdown_rx,
        ));
        *task = Some(FeedTask {
            generation,
            shutdown_tx,
            handle,
        });
    }

    /// Closes the feed without scheduling a reconnect and waits for the
    /// background task to finish. A `connect()` issued meanwhile starts a
    /// fresh feed whose state is left alone.
    pub async fn disconnect(&self) {
        let Some(task) = self.lock_task().take() else {
            return;
        };

        let _ = task.shutdown_tx.send(true);
        if let Err(err) = task.handle.await {
            if !err.is_cancelled() {
                log::warn!("ranking feed task failed: {err}");
            }
        }
        self.shared
            .set_state(task.generation, ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn leaderboard(&self) -> Vec<RankingEntry> {
        self.shared.board.borrow().entries().to_vec()
    }

    pub fn series(&self, id: BoothId) -> Vec<SalesPoint> {
        self.shared
            .board
            .borrow()
            .series(id)
            .map(|series| series.to_vec())
            .unwrap_or_default()
    }

    pub fn subscribe_leaderboard(&self) -> watch::Receiver<Leaderboard> {
        self.shared.board.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<FeedTask>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<F> Drop for LiveRankingClient<F>
where
    F: FeedConnector,
{
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionEnd {
    Voluntary,
    Dropped,
}

async fn feed_loop<F>(
    connector: Arc<F>,
    url: Url,
    config: RankingConfig,
    shared: Arc<FeedShared>,
    generation: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: FeedConnector,
{
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        shared.set_state(generation, ConnectionState::Connecting);
        log::debug!("connecting to ranking feed {url}");

        let connected = tokio::select! {
            connected = connector.connect(&url) => connected,
            changed = shutdown_rx.changed() => {
                if shutdown_signaled(changed, &shutdown_rx) {
                    break;
                }
                continue;
            }
        };

        let end = match connected {
            Ok(socket) => {
                shared.reconnect_attempts.store(0, Ordering::SeqCst);
                shared.set_state(generation, ConnectionState::Open);
                log::info!("ranking feed open at {url}");
                run_session(socket, &config, &shared, generation, &mut shutdown_rx).await
            }
            Err(err) => {
                log::warn!("ranking feed connect failed: {:?}", err.display_chain());
                SessionEnd::Dropped
            }
        };

        shared.set_state(generation, ConnectionState::Disconnected);
        if end == SessionEnd::Voluntary {
            log::info!("ranking feed closed");
            break;
        }
        if !shared.is_current(generation) {
            break;
        }

        let attempts = shared.reconnect_attempts.load(Ordering::SeqCst);
        if attempts >= config.max_reconnect_attempts {
            log::warn!(
                "ranking feed lost after {attempts} reconnect attempts; giving up until restarted"
            );
            break;
        }

        let attempt = attempts + 1;
        shared.reconnect_attempts.store(attempt, Ordering::SeqCst);
        log::info!(
            "ranking feed lost; reconnecting in {:?} (attempt {attempt}/{})",
            config.reconnect_delay,
            config.max_reconnect_attempts
        );

        tokio::select! {
            _ = sleep(config.reconnect_delay) => {}
            changed = shutdown_rx.changed() => {
                if shutdown_signaled(changed, &shutdown_rx) {
                    break;
                }
            }
        }
    }

    shared.set_state(generation, ConnectionState::Disconnected);
}

async fn run_session<S>(
    mut socket: S,
    config: &RankingConfig,
    shared: &FeedShared,
    generation: u64,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    S: FeedSocket,
{
    let mut keep_alive = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = socket.next_text() => match frame {
                Some(Ok(text)) => apply_feed_text(&text, shared),
                Some(Err(err)) => {
                    log::warn!("ranking feed receive failed: {:?}", err.display_chain());
                    return SessionEnd::Dropped;
                }
                None => {
                    log::info!("ranking feed closed by server");
                    return SessionEnd::Dropped;
                }
            },
            _ = keep_alive.tick() => {
                if let Err(err) = socket.send_text(ping_message()).await {
                    log::warn!("ranking feed ping failed: {:?}", err.display_chain());
                    return SessionEnd::Dropped;
                }
                log::trace!("ranking feed ping sent");
            }
            changed = shutdown_rx.changed() => {
                if shutdown_signaled(changed, shutdown_rx) {
                    shared.set_state(generation, ConnectionState::Closing);
                    socket.close().await;
                    return SessionEnd::Voluntary;
                }
            }
        }
    }
}

fn apply_feed_text(text: &str, shared: &FeedShared) {
    match FeedMessage::decode(text) {
        Ok(FeedMessage::Pong) => log::trace!("ranking feed pong"),
        Ok(FeedMessage::Leaderboard(update)) => {
            shared.board.send_if_modified(|board| {
                let applied = board.apply_updates(update.as_slice());
                log::debug!(
                    "applied {applied} of {} ranking update(s)",
                    update.as_slice().len()
                );
                applied > 0
            });
        }
        Err(err) => {
            log::warn!(
                "discarding malformed ranking message: {:?}",
                err.display_chain()
            );
        }
    }
}

fn shutdown_signaled(
    changed: Result<(), watch::error::RecvError>,
    shutdown_rx: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *shutdown_rx.borrow()
}

//! Looking-for-game reports
//!
//! When a user opens a game and nobody joins within the configured delay, a
//! short report is posted through a [`Broadcaster`] so players outside the
//! server can find the game. Joining, starting or leaving the game before the
//! delay elapses cancels the report; a report that was already posted is
//! closed instead.

use crate::config::RelayConfig;
use crate::scheduler::DelayedNotifier;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One user waiting for opponents in one game
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookingForGameEvent {
    pub game_id: u32,
    pub game_title: String,
    pub user_id: u16,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookingForGameReport {
    pub username: String,
    pub game_title: String,
    pub server_name: String,
}

impl fmt::Display for LookingForGameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User: {}\nGame: {}\nServer: {}",
            self.username, self.game_title, self.server_name
        )
    }
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast rejected: {0}")]
    Rejected(String),
}

/// An external service that publishes reports
pub trait Broadcaster: Send + Sync {
    /// Publishes a report and returns a link to it
    fn post(&self, report: &LookingForGameReport) -> Result<String, BroadcastError>;

    /// Marks a previously posted report as no longer relevant
    fn close(&self, link: &str);
}

/// Broadcaster that only writes reports to the log
#[derive(Debug, Default)]
pub struct LogBroadcaster {
    posted: AtomicU64,
}

impl Broadcaster for LogBroadcaster {
    fn post(&self, report: &LookingForGameReport) -> Result<String, BroadcastError> {
        let n = self.posted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Looking for game: {} wants to play {} on {}",
            report.username, report.game_title, report.server_name
        );
        Ok(format!("log://looking-for-game/{}", n))
    }

    fn close(&self, link: &str) {
        info!("Looking-for-game report closed: {}", link);
    }
}

type PostedReports = Arc<Mutex<HashMap<LookingForGameEvent, String>>>;

pub struct LookingForGameReporter {
    enabled: bool,
    delay: Duration,
    blocked_suffixes: Vec<String>,
    server_name: String,
    notifier: DelayedNotifier<LookingForGameEvent>,
    broadcaster: Arc<dyn Broadcaster>,
    posted: PostedReports,
}

impl LookingForGameReporter {
    pub fn new(config: &RelayConfig, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            enabled: config.looking_for_game_enabled,
            delay: config.looking_for_game_delay,
            blocked_suffixes: config.looking_for_game_blocked_suffixes.clone(),
            server_name: config.server_name.clone(),
            notifier: DelayedNotifier::new(),
            broadcaster,
            posted: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether `event` is eligible for a report at all
    pub fn should_report(&self, event: &LookingForGameEvent) -> bool {
        if !self.enabled {
            return false;
        }

        // Chat and away rooms are not games
        if event.game_title.starts_with('*') {
            return false;
        }

        let name = event.username.as_str();
        if name.contains('@') || name.contains('＠') {
            let handle = name.trim_start_matches(['@', '＠']);
            if self
                .blocked_suffixes
                .iter()
                .any(|suffix| handle.contains(suffix.as_str()))
            {
                return false;
            }
        }
        true
    }

    /// Schedules a report for `event` after the configured delay
    ///
    /// Returns false without scheduling anything if the event is not
    /// eligible. Once posted, `on_posted` receives the report link.
    pub fn report_and_start_timer<F>(&self, event: LookingForGameEvent, on_posted: F) -> bool
    where
        F: FnOnce(String) + Send + 'static,
    {
        if !self.should_report(&event) {
            return false;
        }

        let report = LookingForGameReport {
            username: event.username.clone(),
            game_title: event.game_title.clone(),
            server_name: self.server_name.clone(),
        };
        let broadcaster = Arc::clone(&self.broadcaster);
        let posted = Arc::clone(&self.posted);
        let key = event.clone();

        self.notifier.arm(event, self.delay, move || {
            match broadcaster.post(&report) {
                Ok(link) => {
                    debug!("Posted looking-for-game report: {}", link);
                    posted.lock().insert(key, link.clone());
                    on_posted(link);
                }
                Err(e) => warn!("Failed to post looking-for-game report: {}", e),
            }
        });
        true
    }

    pub fn cancel_actions_for_user(&self, user_id: u16) -> bool {
        self.cancel_matching(|event| event.user_id == user_id)
    }

    pub fn cancel_actions_for_game(&self, game_id: u32) -> bool {
        self.cancel_matching(|event| event.game_id == game_id)
    }

    pub fn pending_count(&self) -> usize {
        self.notifier.pending_count()
    }

    fn cancel_matching<P>(&self, predicate: P) -> bool
    where
        P: Fn(&LookingForGameEvent) -> bool,
    {
        let cancelled = self.notifier.cancel_matching(&predicate);

        let closed: Vec<String> = {
            let mut posted = self.posted.lock();
            let keys: Vec<LookingForGameEvent> =
                posted.keys().filter(|e| predicate(e)).cloned().collect();
            keys.iter().filter_map(|key| posted.remove(key)).collect()
        };
        for link in &closed {
            self.broadcaster.close(link);
        }

        cancelled || !closed.is_empty()
    }
}

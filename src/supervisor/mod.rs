//! Interval checkers watching build feeds and keeping servers alive.

mod build;
mod health;
mod task;

pub use health::SlotHealth;
pub use task::MAX_PERIOD;

use crate::{builds::Feed, server::Slot};
use anyhow::Result;
use async_trait::async_trait;
use build::BuildCheck;
use health::{HealthCheck, Watch};
use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use task::Task;
use tokio::sync::Mutex;

/// Where a notification should be posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Staff facing alerts and announcements.
    Alert,
    /// Player facing announcements.
    Main,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: Channel, text: &str) -> Result<()>;
}

/// Tells which of the given `ip:port` addresses are publicly listed.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn query(&self, addresses: &[String]) -> Result<HashSet<String>>;
}

#[async_trait]
pub trait BuildFeed: Send + Sync {
    /// Fingerprint of the newest build.
    async fn fetch_hash(&self, feed: Feed) -> Result<String>;
    /// Human readable description of the newest build.
    async fn fetch_details(&self, feed: Feed) -> Result<String>;
}

/// Persisted key/value pairs.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn read(&self, key: &str) -> Option<String>;
    async fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Control over the server slots a health checker watches.
#[async_trait]
pub trait SlotControl: Send + Sync {
    async fn server_dir(&self, slot: Slot) -> Option<PathBuf>;
    async fn port(&self, dir: &Path) -> Result<u16>;
    /// Restarts the server from its newest autosave. `None` if there is none.
    async fn relaunch(&self, slot: Slot, dir: &Path) -> Result<Option<String>>;
    /// Puts the newest autosave aside.
    async fn rotate_autosave(&self, dir: &Path) -> Result<Option<PathBuf>>;
}

pub trait InstallGate: Send + Sync {
    fn in_progress(&self) -> bool;
}

/// Everything the checkers talk to.
#[derive(Clone)]
pub struct Backends {
    pub slots: Arc<dyn SlotControl>,
    pub status: Arc<dyn StatusSource>,
    pub builds: Arc<dyn BuildFeed>,
    pub store: Arc<dyn HashStore>,
    pub notifier: Arc<dyn Notifier>,
    pub gate: Arc<dyn InstallGate>,
    /// Public IPv4 of the watched servers.
    pub host: String,
}

impl Backends {
    async fn notify(&self, channel: Channel, text: &str) {
        if let Err(e) = self.notifier.send(channel, text).await {
            log::error!("Failed to send notification: {:#}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Build(Feed),
    Server(Slot),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Build(feed) => write!(f, "{} builds", feed),
            Target::Server(slot) => write!(f, "Server {}", slot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// The server has no directory to watch.
    MissingDirectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Default)]
struct Checkers {
    dev: Option<Task>,
    launcher: Option<Task>,
    health: Option<Task>,
}

impl Checkers {
    fn build_mut(&mut self, feed: Feed) -> &mut Option<Task> {
        match feed {
            Feed::Dev => &mut self.dev,
            Feed::Launcher => &mut self.launcher,
        }
    }
}

/// Starts and stops the interval checkers. At most one checker runs per target.
pub struct Supervisor {
    backends: Backends,
    checkers: Mutex<Checkers>,
    watch: Arc<Mutex<Watch>>,
}

impl Supervisor {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            checkers: Mutex::new(Checkers::default()),
            watch: Arc::new(Mutex::new(Watch::default())),
        }
    }

    /// Starts checking `target` every `period`.
    ///
    /// Servers join the already running health checker, which keeps its period.
    pub async fn start(&self, target: Target, period: Duration) -> StartOutcome {
        if let Target::Server(slot) = target {
            if !slot.is_primary() && self.backends.slots.server_dir(slot).await.is_none() {
                return StartOutcome::MissingDirectory;
            }
        }

        let mut checkers = self.checkers.lock().await;
        match target {
            Target::Build(feed) => {
                let checker = checkers.build_mut(feed);
                if checker.is_some() {
                    return StartOutcome::AlreadyRunning;
                }

                let check = Arc::new(BuildCheck::new(feed, self.backends.clone()));
                *checker = Some(Task::repeat(period, move || {
                    let check = check.clone();
                    async move { check.tick().await }
                }));
            }
            Target::Server(slot) => {
                if !self.watch.lock().await.insert(slot) {
                    return StartOutcome::AlreadyRunning;
                }

                if checkers.health.is_none() {
                    let check = Arc::new(HealthCheck::new(
                        self.backends.clone(),
                        self.watch.clone(),
                    ));
                    checkers.health = Some(Task::repeat(period, move || {
                        let check = check.clone();
                        async move { check.tick().await }
                    }));
                }
            }
        }

        log::info!("Started checking {} every {:?}.", target, period);
        StartOutcome::Started
    }

    /// Stops checking `target`. The health checker is torn down once it watches no server.
    pub async fn stop(&self, target: Target) -> StopOutcome {
        let mut checkers = self.checkers.lock().await;
        match target {
            Target::Build(feed) => match checkers.build_mut(feed).take() {
                Some(task) => task.cancel(),
                None => return StopOutcome::NotRunning,
            },
            Target::Server(slot) => {
                let mut watch = self.watch.lock().await;
                if !watch.remove(slot) {
                    return StopOutcome::NotRunning;
                }
                if watch.is_empty() {
                    if let Some(task) = checkers.health.take() {
                        task.cancel();
                        log::info!("No servers left to check, stopped health checker.");
                    }
                }
            }
        }

        log::info!("Stopped checking {}.", target);
        StopOutcome::Stopped
    }

    /// All targets currently checked.
    pub async fn active(&self) -> Vec<Target> {
        let checkers = self.checkers.lock().await;
        let mut targets = Vec::new();
        if checkers.dev.is_some() {
            targets.push(Target::Build(Feed::Dev));
        }
        if checkers.launcher.is_some() {
            targets.push(Target::Build(Feed::Launcher));
        }
        targets.extend(
            self.watch
                .lock()
                .await
                .slots()
                .into_iter()
                .map(Target::Server),
        );
        targets
    }

    /// Health of every watched server.
    pub async fn health(&self) -> Vec<(Slot, SlotHealth)> {
        self.watch.lock().await.health()
    }
}

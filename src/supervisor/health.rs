use super::{Backends, Channel, SlotControl};
use crate::server::{ProcessManager, ScenarioRef, Slot};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use linked_hash_set::LinkedHashSet;
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;

/// Consecutive failed checks after which a server is considered broken.
const ESCALATION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotHealth {
    Healthy,
    /// Down, being restarted.
    Suspect(u32),
    /// Still down after restarting and swapping autosaves. Needs a human.
    Escalated(u32),
}

impl SlotHealth {
    fn from_failures(failures: u32) -> Self {
        match failures {
            0 => SlotHealth::Healthy,
            n if n < ESCALATION => SlotHealth::Suspect(n),
            n => SlotHealth::Escalated(n),
        }
    }
}

impl fmt::Display for SlotHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotHealth::Healthy => write!(f, "Healthy"),
            SlotHealth::Suspect(n) => write!(f, "Restarting ({} failed checks)", n),
            SlotHealth::Escalated(n) => write!(f, "Not working properly ({} failed checks)", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Nothing,
    Restart,
    RotateAndRestart,
}

impl Action {
    fn after(failures: u32) -> Self {
        match failures {
            0 => Action::Nothing,
            n if n < ESCALATION => Action::Restart,
            ESCALATION => Action::RotateAndRestart,
            // Frozen until the server shows up again.
            _ => Action::Nothing,
        }
    }
}

/// Servers watched by the health checker, in the order they were added.
#[derive(Debug, Default)]
pub struct Watch {
    slots: LinkedHashSet<Slot>,
    failures: HashMap<Slot, u32>,
}

impl Watch {
    pub fn insert(&mut self, slot: Slot) -> bool {
        self.slots.insert_if_absent(slot)
    }

    pub fn remove(&mut self, slot: Slot) -> bool {
        self.failures.remove(&slot);
        self.slots.remove(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> Vec<Slot> {
        self.slots.iter().copied().collect()
    }

    pub fn health(&self) -> Vec<(Slot, SlotHealth)> {
        self.slots
            .iter()
            .map(|slot| {
                let failures = self.failures.get(slot).copied().unwrap_or(0);
                (*slot, SlotHealth::from_failures(failures))
            })
            .collect()
    }

    /// Records the outcome of a check. `None` if the server is no longer watched.
    fn record(&mut self, slot: Slot, online: bool) -> Option<u32> {
        if !self.slots.contains(&slot) {
            return None;
        }
        let failures = self.failures.entry(slot).or_insert(0);
        *failures = if online { 0 } else { failures.saturating_add(1) };
        Some(*failures)
    }
}

#[derive(Debug)]
struct Probe {
    slot: Slot,
    dir: PathBuf,
    address: String,
}

/// Restarts watched servers which vanished from the master server.
pub struct HealthCheck {
    backends: Backends,
    watch: Arc<Mutex<Watch>>,
}

impl HealthCheck {
    pub fn new(backends: Backends, watch: Arc<Mutex<Watch>>) -> Self {
        Self { backends, watch }
    }

    pub async fn tick(&self) {
        if self.installing() {
            return;
        }

        let slots = self.watch.lock().await.slots();
        let probes: Vec<Probe> = join_all(slots.into_iter().map(|slot| self.probe(slot)))
            .await
            .into_iter()
            .flatten()
            .collect();
        if probes.is_empty() {
            return;
        }

        let addresses: Vec<String> = probes.iter().map(|p| p.address.clone()).collect();
        let online = match self.backends.status.query(&addresses).await {
            Ok(online) => online,
            Err(e) => {
                log::warn!("Unsuccessful master server request: {:#}", e);
                return;
            }
        };

        if self.installing() {
            return;
        }

        let actions: Vec<(Probe, Action)> = {
            let mut watch = self.watch.lock().await;
            probes
                .into_iter()
                .filter_map(|probe| {
                    let failures = watch.record(probe.slot, online.contains(&probe.address))?;
                    Some((probe, Action::after(failures)))
                })
                .collect()
        };

        for (probe, action) in actions {
            if action != Action::Nothing && self.installing() {
                return;
            }
            match action {
                Action::Nothing => {}
                Action::Restart => {
                    log::warn!("Server {} ({}) is down.", probe.slot, probe.address);
                    self.relaunch(&probe).await;
                    self.backends
                        .notify(
                            Channel::Alert,
                            &format!(
                                "Hmm... Server {} appears to be down, restarting!",
                                probe.slot
                            ),
                        )
                        .await;
                }
                Action::RotateAndRestart => {
                    log::error!(
                        "Server {} ({}) is still down after restarting.",
                        probe.slot,
                        probe.address
                    );
                    match self.backends.slots.rotate_autosave(&probe.dir).await {
                        Ok(Some(path)) => log::info!("Put {} aside.", path.display()),
                        Ok(None) => log::info!("No autosave of server {} to put aside.", probe.slot),
                        Err(e) => log::error!("Failed to rotate autosave: {:#}", e),
                    }
                    self.relaunch(&probe).await;
                    self.backends
                        .notify(
                            Channel::Alert,
                            &format!(
                                "Server {} is not working properly, changing autosaves.",
                                probe.slot
                            ),
                        )
                        .await;
                }
            }
        }
    }

    /// Servers are never touched while their binary is being replaced.
    fn installing(&self) -> bool {
        let installing = self.backends.gate.in_progress();
        if installing {
            log::debug!("Installation in progress, skipping server check.");
        }
        installing
    }

    async fn probe(&self, slot: Slot) -> Option<Probe> {
        let dir = match self.backends.slots.server_dir(slot).await {
            Some(dir) => dir,
            None => {
                log::warn!("Directory of server {} vanished, skipping it.", slot);
                return None;
            }
        };
        let port = match self.backends.slots.port(&dir).await {
            Ok(port) => port,
            Err(e) => {
                log::warn!("Skipping server {}: {:#}", slot, e);
                return None;
            }
        };

        Some(Probe {
            slot,
            address: format!("{}:{}", self.backends.host, port),
            dir,
        })
    }

    async fn relaunch(&self, probe: &Probe) {
        match self.backends.slots.relaunch(probe.slot, &probe.dir).await {
            Ok(Some(save)) => log::info!("Relaunched server {} from {}.", probe.slot, save),
            Ok(None) => log::warn!("Server {} has no autosave to relaunch from.", probe.slot),
            Err(e) => log::error!("Failed to relaunch server {}: {:#}", probe.slot, e),
        }
    }
}

#[async_trait]
impl SlotControl for ProcessManager {
    async fn server_dir(&self, slot: Slot) -> Option<PathBuf> {
        ProcessManager::server_dir(self, slot).await
    }

    async fn port(&self, dir: &Path) -> Result<u16> {
        Ok(ProcessManager::port(self, dir).await?)
    }

    async fn relaunch(&self, slot: Slot, dir: &Path) -> Result<Option<String>> {
        let headless = self.is_headless(slot).await;
        Ok(self
            .launch(&ScenarioRef::Autosave, slot, dir, headless)
            .await?)
    }

    async fn rotate_autosave(&self, dir: &Path) -> Result<Option<PathBuf>> {
        Ok(ProcessManager::rotate_autosave(self, dir).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fakes::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn slot(id: u32) -> Slot {
        Slot::new(id).unwrap()
    }

    async fn watching(harness: &Harness, slots: &[u32]) -> (HealthCheck, Arc<Mutex<Watch>>) {
        let watch = Arc::new(Mutex::new(Watch::default()));
        for id in slots {
            watch.lock().await.insert(slot(*id));
        }
        (HealthCheck::new(harness.backends(), watch.clone()), watch)
    }

    #[test]
    fn escalation_tiers() {
        assert_eq!(Action::after(0), Action::Nothing);
        assert_eq!(Action::after(1), Action::Restart);
        assert_eq!(Action::after(2), Action::Restart);
        assert_eq!(Action::after(3), Action::RotateAndRestart);
        assert_eq!(Action::after(4), Action::Nothing);
        assert_eq!(Action::after(40), Action::Nothing);

        assert_eq!(SlotHealth::from_failures(2), SlotHealth::Suspect(2));
        assert_eq!(SlotHealth::from_failures(5), SlotHealth::Escalated(5));
    }

    #[tokio::test]
    async fn three_failed_checks_escalate_once() {
        let harness = Harness::new(&[(2, 5000)]);
        let (check, watch) = watching(&harness, &[2]).await;

        for _ in 0..6 {
            check.tick().await;
        }

        assert_eq!(
            harness.slots.calls(),
            vec![
                Call::Relaunch(slot(2)),
                Call::Relaunch(slot(2)),
                Call::Rotate(slot(2)),
                Call::Relaunch(slot(2)),
            ]
        );
        let sent = harness.notifier.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent[2].1.contains("not working properly"));
        assert_eq!(
            watch.lock().await.health(),
            vec![(slot(2), SlotHealth::Escalated(6))]
        );
    }

    #[tokio::test]
    async fn healthy_check_resets_the_counter() {
        let harness = Harness::new(&[(1, 11753)]);
        let (check, watch) = watching(&harness, &[1]).await;

        check.tick().await;
        check.tick().await;
        harness.status.push_online(&["10.0.0.1:11753"]);
        check.tick().await;
        assert_eq!(
            watch.lock().await.health(),
            vec![(Slot::PRIMARY, SlotHealth::Healthy)]
        );

        // Counting starts over: a single restart, no escalation.
        check.tick().await;
        let calls = harness.slots.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| *c == Call::Relaunch(Slot::PRIMARY)));
    }

    #[tokio::test]
    async fn failed_queries_change_nothing() {
        let harness = Harness::new(&[(1, 11753)]);
        let (check, watch) = watching(&harness, &[1]).await;

        check.tick().await;
        harness.status.push_failure();
        harness.status.push_failure();
        check.tick().await;
        check.tick().await;

        assert_eq!(harness.slots.calls().len(), 1);
        assert_eq!(harness.notifier.sent().len(), 1);
        assert_eq!(
            watch.lock().await.health(),
            vec![(Slot::PRIMARY, SlotHealth::Suspect(1))]
        );
    }

    #[tokio::test]
    async fn installation_skips_the_tick() {
        let harness = Harness::new(&[(1, 11753)]);
        let (check, _) = watching(&harness, &[1]).await;
        harness.gate.0.store(true, Ordering::SeqCst);

        check.tick().await;

        assert_eq!(harness.status.queries(), 0);
        assert!(harness.slots.calls().is_empty());
    }

    /// Starts an installation while the master server is being asked.
    struct InstallDuringQuery(Arc<FakeGate>);

    #[async_trait]
    impl super::super::StatusSource for InstallDuringQuery {
        async fn query(&self, _addresses: &[String]) -> Result<std::collections::HashSet<String>> {
            self.0 .0.store(true, Ordering::SeqCst);
            Ok(Default::default())
        }
    }

    #[tokio::test]
    async fn installation_started_during_query_prevents_restarts() {
        let harness = Harness::new(&[(1, 11753)]);
        let mut backends = harness.backends();
        backends.status = Arc::new(InstallDuringQuery(harness.gate.clone()));
        let watch = Arc::new(Mutex::new(Watch::default()));
        watch.lock().await.insert(Slot::PRIMARY);
        let check = HealthCheck::new(backends, watch.clone());

        check.tick().await;

        assert!(harness.gate.0.load(Ordering::SeqCst));
        assert!(harness.slots.calls().is_empty());
        assert!(harness.notifier.sent().is_empty());
        assert_eq!(
            watch.lock().await.health(),
            vec![(Slot::PRIMARY, SlotHealth::Healthy)]
        );
    }

    #[tokio::test]
    async fn one_query_for_all_servers() {
        let harness = Harness::new(&[(1, 11753), (2, 5000), (3, 5001)]);
        let (check, watch) = watching(&harness, &[1, 2, 3]).await;
        harness
            .status
            .push_online(&["10.0.0.1:11753", "10.0.0.1:5001"]);

        check.tick().await;

        assert_eq!(harness.status.queries(), 1);
        assert_eq!(harness.slots.calls(), vec![Call::Relaunch(slot(2))]);
        assert_eq!(
            watch.lock().await.health(),
            vec![
                (slot(1), SlotHealth::Healthy),
                (slot(2), SlotHealth::Suspect(1)),
                (slot(3), SlotHealth::Healthy),
            ]
        );
    }

    #[tokio::test]
    async fn servers_without_config_are_skipped() {
        // Server 4 is watched but has no port configured.
        let harness = Harness::new(&[(1, 11753)]);
        let (check, watch) = watching(&harness, &[1, 4]).await;
        harness.status.push_online(&["10.0.0.1:11753"]);

        check.tick().await;

        assert_eq!(harness.status.queries(), 1);
        assert!(harness.slots.calls().is_empty());
        assert_eq!(
            watch.lock().await.health(),
            vec![
                (Slot::PRIMARY, SlotHealth::Healthy),
                (slot(4), SlotHealth::Healthy)
            ]
        );
    }

    #[tokio::test]
    async fn nothing_watched_means_no_query() {
        let harness = Harness::new(&[(1, 11753)]);
        let (check, _) = watching(&harness, &[]).await;

        check.tick().await;

        assert_eq!(harness.status.queries(), 0);
    }
}

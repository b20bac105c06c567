pub mod files;

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};
use tokio::{process::Command, sync::Mutex};

/// Logical server number. `1` is the primary installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u32);

impl Slot {
    pub const PRIMARY: Slot = Slot(1);

    pub fn new(id: u32) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a server should load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioRef {
    /// Scenario file inside the scenario directory.
    File(String),
    /// Newest autosave of the server.
    Autosave,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to read `{key}` from {}: {reason}", .path.display())]
    Config {
        path: PathBuf,
        key: String,
        reason: String,
    },
    #[error("failed to spawn {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("server process exited before it could be tracked")]
    Vanished,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
struct Instance {
    pid: u32,
    headless: bool,
}

/// Starts, stops and keeps track of OpenRCT2 server processes.
#[derive(Debug)]
pub struct ProcessManager {
    binary: PathBuf,
    root: PathBuf,
    scenarios: PathBuf,
    instances: Arc<Mutex<HashMap<Slot, Instance>>>,
    loaded: Mutex<HashMap<Slot, String>>,
}

impl ProcessManager {
    pub fn new<B, R, S>(binary: B, root: R, scenarios: S) -> Self
    where
        B: Into<PathBuf>,
        R: Into<PathBuf>,
        S: Into<PathBuf>,
    {
        Self {
            binary: binary.into(),
            root: root.into(),
            scenarios: scenarios.into(),
            instances: Arc::new(Mutex::new(HashMap::new())),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Userdata directory of a server. The primary one always exists.
    pub async fn server_dir(&self, slot: Slot) -> Option<PathBuf> {
        if slot.is_primary() {
            Some(self.root.clone())
        } else {
            files::find_server_dir(&self.root, slot.id()).await
        }
    }

    pub async fn port(&self, dir: &Path) -> Result<u16, ServerError> {
        files::read_port(dir).await
    }

    /// Launches a server in `dir`, replacing whatever ran on `slot` before.
    ///
    /// Returns the name of what got loaded or `None` if there was no autosave to resume.
    pub async fn launch(
        &self,
        scenario: &ScenarioRef,
        slot: Slot,
        dir: &Path,
        headless: bool,
    ) -> Result<Option<String>, ServerError> {
        let port = self.port(dir).await?;

        let (path, name) = match scenario {
            ScenarioRef::File(file) => {
                let path = self.scenarios.join(file);
                let name = files::display_name(&path);
                (path, name)
            }
            ScenarioRef::Autosave => match files::latest_autosave(dir).await {
                Some(path) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    (path, name)
                }
                None => {
                    log::info!("Server {} has no autosave to resume.", slot);
                    return Ok(None);
                }
            },
        };

        self.stop(slot).await;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("host").arg(&path);
        cmd.args(["--port", &port.to_string()]);
        if headless {
            cmd.arg("--headless");
        }
        if !slot.is_primary() {
            cmd.arg("--user-data-path").arg(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        // Own process group so the server outlives the bot and its signals.
        #[cfg(unix)]
        cmd.process_group(0);

        log::debug!("Executing: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|source| ServerError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;
        let pid = child.id().ok_or(ServerError::Vanished)?;

        log::info!(
            "Started server {} on port {} with '{}' (pid {}).",
            slot,
            port,
            name,
            pid
        );
        self.instances
            .lock()
            .await
            .insert(slot, Instance { pid, headless });

        let instances = Arc::clone(&self.instances);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => log::info!("Server {} (pid {}) exited with {}", slot, pid, status),
                Err(e) => log::warn!("Failed to wait for server {} (pid {}): {}", slot, pid, e),
            }
            let mut instances = instances.lock().await;
            // The slot may already run a newer process.
            if instances.get(&slot).map(|i| i.pid) == Some(pid) {
                instances.remove(&slot);
            }
        });
        if matches!(scenario, ScenarioRef::File(_)) {
            self.loaded.lock().await.insert(slot, name.clone());
        }

        Ok(Some(name))
    }

    /// Signals the server on `slot` to shut down. Returns whether one was running.
    pub async fn stop(&self, slot: Slot) -> bool {
        let instance = match self.instances.lock().await.remove(&slot) {
            Some(instance) => instance,
            None => return false,
        };

        log::info!("Stopping server {} (pid {}).", slot, instance.pid);
        if let Err(e) = terminate(instance.pid) {
            log::warn!("Failed to signal server {} (pid {}): {}", slot, instance.pid, e);
        }

        true
    }

    /// Slots with a tracked server process.
    pub async fn running(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self.instances.lock().await.keys().copied().collect();
        slots.sort();
        slots
    }

    pub async fn is_headless(&self, slot: Slot) -> bool {
        self.instances
            .lock()
            .await
            .get(&slot)
            .map(|i| i.headless)
            .unwrap_or(false)
    }

    /// Last scenario explicitly loaded on `slot`.
    pub async fn current_scenario(&self, slot: Slot) -> Option<String> {
        self.loaded.lock().await.get(&slot).cloned()
    }

    pub async fn rotate_autosave(&self, dir: &Path) -> Result<Option<PathBuf>, ServerError> {
        files::rotate_autosave(dir).await
    }

    pub async fn find_scenarios(&self, search: &str) -> Result<Vec<String>, ServerError> {
        Ok(files::find_scenarios(&self.scenarios, search).await?)
    }
}

#[cfg(unix)]
fn terminate(pid: u32) -> anyhow::Result<()> {
    use nix::{
        sys::signal::{kill, Signal},
        unistd::Pid,
    };

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)?;
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> anyhow::Result<()> {
    anyhow::bail!("cannot signal pid {} on this platform", pid)
}

//! Installation of new OpenRCT2 builds.

use crate::{
    builds::{BuildClient, Feed},
    server::{ProcessManager, ScenarioRef, Slot},
    supervisor::{Channel, InstallGate, Notifier},
    utils,
};
use anyhow::{Context, Result};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Install {
    /// Another installation is running.
    Busy,
    /// The requested build (or its Linux version) does not exist.
    NotFound,
    Installed {
        version: String,
        file: PathBuf,
        /// Servers resumed after the installation.
        restarted: Vec<Slot>,
    },
}

/// Marks an installation as running until dropped.
struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Installer {
    builds: BuildClient,
    servers: Arc<ProcessManager>,
    notifier: Arc<dyn Notifier>,
    download_dir: PathBuf,
    install_dir: PathBuf,
    grace: Duration,
    running: AtomicBool,
}

impl Installer {
    pub fn new(
        builds: BuildClient,
        servers: Arc<ProcessManager>,
        notifier: Arc<dyn Notifier>,
        download_dir: PathBuf,
        install_dir: PathBuf,
        grace: Duration,
    ) -> Self {
        Self {
            builds,
            servers,
            notifier,
            download_dir,
            install_dir,
            grace,
            running: AtomicBool::new(false),
        }
    }

    fn begin(&self) -> Option<Running<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Running(&self.running))
    }

    async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send(Channel::Main, text).await {
            log::error!("Failed to send notification: {:#}", e);
        }
    }

    /// Installs the develop build `tag`, or the latest one.
    ///
    /// Running servers are shut down after a grace period and resumed from
    /// their autosave afterwards, even if the installation itself failed.
    pub async fn install(&self, tag: Option<&str>) -> Result<Install> {
        let _running = match self.begin() {
            Some(running) => running,
            None => return Ok(Install::Busy),
        };

        let release = match tag {
            Some(tag) => match self.builds.release(Feed::Dev, tag).await? {
                Some(release) => release,
                None => return Ok(Install::NotFound),
            },
            None => self.builds.latest(Feed::Dev).await?,
        };
        let asset = match release.linux_asset() {
            Some(asset) => asset.clone(),
            None => return Ok(Install::NotFound),
        };
        log::info!("Installing {} from {}", release.tag_name, asset.browser_download_url);

        let mut stopped = Vec::new();
        let running = self.servers.running().await;
        if !running.is_empty() {
            self.notify(&format!(
                "We're updating our OpenRCT2 build in {} seconds! Please save your current progress then disconnect.",
                self.grace.as_secs()
            ))
            .await;
            tokio::time::sleep(self.grace).await;

            for slot in running {
                let headless = self.servers.is_headless(slot).await;
                if self.servers.stop(slot).await {
                    stopped.push((slot, headless));
                }
            }
        }

        let file = self.download_dir.join(&asset.name);
        let installed = self.fetch_and_extract(&asset.browser_download_url, &file).await;
        let restarted = self.resume(&stopped).await;
        installed?;

        self.notify(&format!(
            "OpenRCT2 has been updated to **{}**!",
            release.tag_name
        ))
        .await;
        Ok(Install::Installed {
            version: release.tag_name,
            file,
            restarted,
        })
    }

    async fn fetch_and_extract(&self, url: &str, file: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.download_dir.display()))?;
        let bytes = self.builds.download(url).await?;
        tokio::fs::write(file, bytes)
            .await
            .with_context(|| format!("Failed to write {}", file.display()))?;
        log::info!("Downloaded {}", file.display());

        tokio::fs::create_dir_all(&self.install_dir).await?;
        utils::extract(file, &self.install_dir)
            .await
            .context("Failed to extract build")
    }

    async fn resume(&self, stopped: &[(Slot, bool)]) -> Vec<Slot> {
        let mut restarted = Vec::new();
        for (slot, headless) in stopped {
            let dir = match self.servers.server_dir(*slot).await {
                Some(dir) => dir,
                None => {
                    log::warn!("Server {} lost its directory, not resuming.", slot);
                    continue;
                }
            };
            match self
                .servers
                .launch(&ScenarioRef::Autosave, *slot, &dir, *headless)
                .await
            {
                Ok(Some(_)) => restarted.push(*slot),
                Ok(None) => log::warn!("Server {} has no autosave to resume.", slot),
                Err(e) => log::error!("Failed to resume server {}: {}", slot, e),
            }
        }
        restarted
    }
}

impl InstallGate for Installer {
    fn in_progress(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::fakes::FakeNotifier;

    fn installer(dir: &std::path::Path, notifier: Arc<FakeNotifier>) -> Installer {
        // Nothing listens on the discard port.
        let feed = "http://127.0.0.1:9/releases/latest".to_string();
        Installer::new(
            BuildClient::new(reqwest::Client::new(), feed.clone(), feed),
            Arc::new(ProcessManager::new("true", dir, dir.join("scenarios"))),
            notifier,
            dir.join("builds"),
            dir.join("install"),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn only_one_installation_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let installer = installer(dir.path(), Arc::new(FakeNotifier::default()));

        let running = installer.begin().unwrap();
        assert!(installer.in_progress());
        assert_eq!(installer.install(None).await.unwrap(), Install::Busy);

        drop(running);
        assert!(!installer.in_progress());
    }

    #[tokio::test]
    async fn failed_installation_clears_the_flag() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(FakeNotifier::default());
        let installer = installer(dir.path(), notifier.clone());

        assert!(installer.install(Some("v0.4.12")).await.is_err());
        assert!(!installer.in_progress());
        assert!(notifier.sent().is_empty());
    }
}

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

const FILENAME: &str = "settings.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Discord's bot token
    pub token: String,
    /// Discord account id which owns the bot
    pub owner: u64,
    /// Command prefix
    pub prefix: String,
    /// Channel receiving supervisor alerts and build announcements.
    pub alert_channel: u64,
    /// Channel for player facing announcements (e.g. upcoming updates).
    pub main_channel: u64,
    /// Public IPv4 the gameservers are reachable on.
    pub host: String,
    /// OpenRCT2 executable.
    pub binary: PathBuf,
    /// Userdata directory of the primary server. Additional servers live
    /// in sub-directories named `s<N>-...`.
    pub openrct2: PathBuf,
    /// Directory holding the scenario files which can be hosted.
    pub scenarios: PathBuf,
    /// Where downloaded builds are stored.
    pub builds: PathBuf,
    /// Where downloaded builds get extracted to.
    pub install_dir: PathBuf,
    /// Master server listing all public servers.
    pub master_server: String,
    /// Latest release of the develop builds.
    pub dev_feed: String,
    /// Latest release of the launcher.
    pub launcher_feed: String,
    /// Default interval of checkers in seconds.
    pub check_interval: u64,
    /// Seconds players get to save before servers are shut down for an update.
    pub install_grace: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::from("DISCORD_BOT_TOKEN_HERE"),
            owner: 999999999,
            prefix: String::from(","),
            alert_channel: 0,
            main_channel: 0,
            host: String::from("GAMESERVER_IPV4_HERE"),
            binary: PathBuf::from("openrct2"),
            openrct2: PathBuf::from("openrct2"),
            scenarios: PathBuf::from("scenarios"),
            builds: PathBuf::from("builds"),
            install_dir: PathBuf::from("."),
            master_server: String::from("https://servers.openrct2.io"),
            dev_feed: String::from(
                "https://api.github.com/repos/OpenRCT2/OpenRCT2-binaries/releases/latest",
            ),
            launcher_feed: String::from(
                "https://api.github.com/repos/OpenRCT2/OpenLauncher/releases/latest",
            ),
            check_interval: 300,
            install_grace: 30,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings_path = std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string());

        Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name(&settings_path))
            // Add in settings from the environment (with a prefix of BOT)
            // Eg.. `BOT_HOST=1.2.3.4` would set the `host` key
            .add_source(Environment::with_prefix("BOT"))
            .build()?
            .try_deserialize()
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.max(1))
    }

    pub fn install_grace(&self) -> Duration {
        Duration::from_secs(self.install_grace)
    }

    pub async fn save(&self) -> Result<()> {
        let settings_path = std::env::var("BOT_SETTINGS").unwrap_or_else(|_| FILENAME.to_string());
        self.save_to(settings_path).await
    }

    pub async fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create settings directory")?;
        }
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(
            serde_yaml::to_string(&self)
                .context("Failed to serialize settings")?
                .as_bytes(),
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saving_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot").join(FILENAME);

        Settings::default().save_to(&path).await.unwrap();

        let saved: Settings = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.prefix, ",");
        assert_eq!(saved.check_interval, 300);
    }

    #[tokio::test]
    async fn unusable_directories_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("bot");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = Settings::default()
            .save_to(blocker.join(FILENAME))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("settings directory"));
    }
}

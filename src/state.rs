use crate::supervisor::HashStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use config::{Config, ConfigError, File, FileFormat};
use poise::serenity_prelude::UserId;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};
use tokio::sync::Mutex;

const FILENAME: &str = "state.yaml";

/// Bot state which is not intended to be edited manually.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Admins which are allowed to manage the servers.
    admins: HashSet<u64>,
    /// Last seen build fingerprints, e.g. `curdevhash`.
    hashes: BTreeMap<String, String>,
    #[serde(skip)]
    path: PathBuf,
}

impl State {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(Self::path())
    }

    /// Location of the state file, `BOT_STATE` or `state.yaml`.
    pub fn path() -> PathBuf {
        std::env::var("BOT_STATE")
            .unwrap_or_else(|_| FILENAME.to_string())
            .into()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut state: State = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        state.path = path.to_path_buf();

        Ok(state)
    }

    /// Empty state which will be written to `path`.
    pub fn empty<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn admins(&self) -> HashSet<UserId> {
        self.admins.iter().map(|s| UserId::new(*s)).collect()
    }

    pub fn hash(&self, key: &str) -> Option<&str> {
        self.hashes.get(key).map(String::as_str)
    }

    pub async fn set_hash(&mut self, key: &str, value: &str) -> Result<()> {
        self.hashes.insert(key.to_string(), value.to_string());
        self.save().await
    }

    /// adds an admin and saves it to the state
    pub async fn add_admin(&mut self, id: u64) -> Result<bool> {
        let added = self.admins.insert(id);

        self.save().await?;
        Ok(added)
    }

    /// removes an admin and saves it to the state
    pub async fn remove_admin(&mut self, id: u64) -> Result<bool> {
        let removed = self.admins.remove(&id);

        self.save().await?;
        Ok(removed)
    }

    pub async fn save(&self) -> Result<()> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")?;
        }
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        file.write_all(
            serde_yaml::to_string(&self)
                .context("Failed to serialize state")?
                .as_bytes(),
        )
        .await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl HashStore for Mutex<State> {
    async fn read(&self, key: &str) -> Option<String> {
        self.lock().await.hash(key).map(str::to_string)
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock().await.set_hash(key, value).await
    }
}

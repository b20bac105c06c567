use super::{Backends, Channel};
use crate::builds::Feed;

/// Announces new builds of a feed.
pub struct BuildCheck {
    feed: Feed,
    backends: Backends,
}

impl BuildCheck {
    pub fn new(feed: Feed, backends: Backends) -> Self {
        Self { feed, backends }
    }

    fn current_key(&self) -> String {
        format!("cur{}hash", self.feed.tag())
    }

    fn last_key(&self) -> String {
        format!("last{}hash", self.feed.tag())
    }

    pub async fn tick(&self) {
        let latest = match self.backends.builds.fetch_hash(self.feed).await {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("Unsuccessful {} build request: {:#}", self.feed, e);
                return;
            }
        };

        let store = &self.backends.store;
        let current = store.read(&self.current_key()).await;
        if current.as_deref() == Some(latest.as_str()) {
            return;
        }

        match &current {
            Some(current) => {
                log::info!("New {} build: {} -> {}", self.feed, current, latest);
                if let Err(e) = store.write(&self.last_key(), current).await {
                    log::error!("Failed to record previous {} build: {:#}", self.feed, e);
                    return;
                }
            }
            None => log::info!("New {} build: {}", self.feed, latest),
        }
        if let Err(e) = store.write(&self.current_key(), &latest).await {
            log::error!("Failed to record {} build: {:#}", self.feed, e);
            return;
        }

        let details = match self.backends.builds.fetch_details(self.feed).await {
            Ok(details) => details,
            Err(e) => {
                log::warn!("Failed to fetch {} build details: {:#}", self.feed, e);
                format!("Build: **{}**", latest)
            }
        };
        self.backends
            .notify(
                Channel::Alert,
                &format!(
                    "*BREAKING NEWS*\nThere's a **NEW {} BUILD**!\n\n{}",
                    self.feed.headline(),
                    details
                ),
            )
            .await;
    }
}

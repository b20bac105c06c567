//! Latest OpenRCT2 builds, as published through GitHub releases.

use crate::supervisor::BuildFeed;
use anyhow::{Context, Result};
use async_trait::async_trait;
use poise::serenity_prelude::MessageBuilder;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    /// Develop builds of the game.
    Dev,
    /// The game launcher.
    Launcher,
}

impl Feed {
    /// Short tag used for persisted keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Feed::Dev => "dev",
            Feed::Launcher => "lnc",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Feed::Dev => "OPENRCT2",
            Feed::Launcher => "LAUNCHER",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Dev => write!(f, "develop"),
            Feed::Launcher => write!(f, "launcher"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    /// Message describing the release.
    pub fn details(&self) -> String {
        let mut msg = MessageBuilder::new();
        if let Some(name) = &self.name {
            msg.push_italic_line_safe(name.as_str()).push_line("");
        }
        msg.push("Version: ").push_bold_line_safe(self.tag_name.as_str());
        if let Some(author) = &self.author {
            msg.push("Creator: ").push_bold_line_safe(author.login.as_str());
        }
        if let Some(published) = &self.published_at {
            msg.push("Release Date: ").push_bold_line_safe(published.as_str());
        }
        msg.push_line(self.html_url.as_str());
        msg.build()
    }

    /// The Linux build of this release.
    pub fn linux_asset(&self) -> Option<&Asset> {
        self.assets.iter().find(|asset| {
            let name = asset.name.to_lowercase();
            name.contains("linux") && name.ends_with(".tar.gz")
        })
    }
}

/// Fetches releases of the develop and launcher feeds.
#[derive(Debug, Clone)]
pub struct BuildClient {
    client: reqwest::Client,
    dev: String,
    launcher: String,
}

impl BuildClient {
    pub fn new(client: reqwest::Client, dev: String, launcher: String) -> Self {
        Self {
            client,
            dev,
            launcher,
        }
    }

    fn uri(&self, feed: Feed) -> &str {
        match feed {
            Feed::Dev => &self.dev,
            Feed::Launcher => &self.launcher,
        }
    }

    pub async fn latest(&self, feed: Feed) -> Result<Release> {
        self.get(self.uri(feed)).await
    }

    /// A specific release of a feed, e.g. `v0.4.12`. `None` if there is no such release.
    pub async fn release(&self, feed: Feed, tag: &str) -> Result<Option<Release>> {
        let uri = tagged_uri(self.uri(feed), tag);
        let response = self
            .client
            .get(&uri)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", uri))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let release = response
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Unexpected release format from {}", uri))?;
        Ok(Some(release))
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await
            .with_context(|| format!("Failed to download {}", url))?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, uri: &str) -> Result<Release> {
        self.client
            .get(uri)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", uri))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Unexpected release format from {}", uri))
    }
}

/// `.../releases/latest` -> `.../releases/tags/<tag>`
fn tagged_uri(latest: &str, tag: &str) -> String {
    match latest.strip_suffix("latest") {
        Some(base) => format!("{}tags/{}", base, tag),
        None => format!("{}/tags/{}", latest.trim_end_matches('/'), tag),
    }
}

#[async_trait]
impl BuildFeed for BuildClient {
    async fn fetch_hash(&self, feed: Feed) -> Result<String> {
        Ok(self.latest(feed).await?.tag_name)
    }

    async fn fetch_details(&self, feed: Feed) -> Result<String> {
        Ok(self.latest(feed).await?.details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: &str = r#"{
        "tag_name": "v0.4.12",
        "name": "OpenRCT2 v0.4.12",
        "html_url": "https://github.com/OpenRCT2/OpenRCT2/releases/tag/v0.4.12",
        "published_at": "2024-07-07T12:00:00Z",
        "author": { "login": "Gymnasiast" },
        "assets": [
            { "name": "OpenRCT2-v0.4.12-windows-portable-x64.zip", "browser_download_url": "https://example.org/win.zip" },
            { "name": "OpenRCT2-v0.4.12-linux-x86_64.tar.gz", "browser_download_url": "https://example.org/linux.tar.gz" },
            { "name": "OpenRCT2-v0.4.12-linux-x86_64.AppImage", "browser_download_url": "https://example.org/linux.AppImage" }
        ]
    }"#;

    #[test]
    fn picks_the_linux_tarball() {
        let release: Release = serde_json::from_str(RELEASE).unwrap();

        let asset = release.linux_asset().unwrap();
        assert_eq!(asset.browser_download_url, "https://example.org/linux.tar.gz");
    }

    #[test]
    fn details_mention_version_and_page() {
        let release: Release = serde_json::from_str(RELEASE).unwrap();

        let details = release.details();
        assert!(details.contains("v0.4.12"));
        assert!(details.contains("Gymnasiast"));
        assert!(details.contains("https://github.com/OpenRCT2/OpenRCT2/releases/tag/v0.4.12"));
    }

    #[test]
    fn minimal_release_parses() {
        let release: Release =
            serde_json::from_str(r#"{"tag_name": "v1", "html_url": "https://x"}"#).unwrap();

        assert!(release.linux_asset().is_none());
        assert!(release.details().contains("v1"));
    }

    #[test]
    fn tags_replace_latest() {
        assert_eq!(
            tagged_uri("https://api.github.com/repos/a/b/releases/latest", "v0.4.12"),
            "https://api.github.com/repos/a/b/releases/tags/v0.4.12"
        );
        assert_eq!(
            tagged_uri("https://example.org/releases/", "v1"),
            "https://example.org/releases/tags/v1"
        );
    }
}

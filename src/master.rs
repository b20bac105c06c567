//! Lookups against the OpenRCT2 master server list.

use crate::supervisor::StatusSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerList {
    #[serde(default)]
    pub servers: Vec<ListedServer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListedServer {
    pub ip: Ip,
    pub port: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ip {
    #[serde(default)]
    pub v4: Vec<String>,
}

impl ListedServer {
    pub fn ipv4(&self) -> Option<&str> {
        self.ip.v4.first().map(String::as_str)
    }

    pub fn address(&self) -> Option<String> {
        self.ipv4().map(|ip| format!("{}:{}", ip, self.port))
    }
}

/// Result of a lookup: every listed server matching at least one input,
/// and the inputs which matched something.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    pub servers: Vec<ListedServer>,
    pub matches: Vec<String>,
}

impl Lookup {
    /// Inputs which matched nothing.
    pub fn misses<'a>(&self, inputs: &'a [String]) -> Vec<&'a str> {
        inputs
            .iter()
            .filter(|input| !self.matches.contains(input))
            .map(String::as_str)
            .collect()
    }
}

/// Matches listed servers by ip, `ip:port` or a (lower case) part of their name.
pub fn lookup(list: ServerList, inputs: &[String]) -> Lookup {
    let mut result = Lookup::default();
    let mut remember = |input: &str| {
        if !result.matches.iter().any(|m| m == input) {
            result.matches.push(input.to_string());
        }
    };

    let mut servers = Vec::new();
    for server in list.servers {
        let ip = server.ipv4();
        let address = server.address();
        let by_address = inputs
            .iter()
            .find(|input| Some(input.as_str()) == ip || Some(*input) == address.as_ref());

        let found = match by_address {
            Some(input) => {
                remember(input.as_str());
                true
            }
            None => {
                let name = server.name.to_lowercase();
                let mut found = false;
                for input in inputs.iter().filter(|input| name.contains(input.as_str())) {
                    remember(input.as_str());
                    found = true;
                }
                found
            }
        };
        if found {
            servers.push(server);
        }
    }

    result.servers = servers;
    result
}

pub struct MasterServer {
    client: reqwest::Client,
    uri: String,
}

impl MasterServer {
    pub fn new(client: reqwest::Client, uri: String) -> Self {
        Self { client, uri }
    }

    pub async fn list(&self) -> Result<ServerList> {
        self.client
            .get(&self.uri)
            .send()
            .await
            .with_context(|| format!("Failed to reach master server {}", self.uri))?
            .error_for_status()?
            .json()
            .await
            .context("Unexpected master server response")
    }

    pub async fn query(&self, inputs: &[String]) -> Result<Lookup> {
        if inputs.is_empty() {
            return Ok(Lookup::default());
        }
        Ok(lookup(self.list().await?, inputs))
    }
}

#[async_trait]
impl StatusSource for MasterServer {
    async fn query(&self, addresses: &[String]) -> Result<HashSet<String>> {
        Ok(MasterServer::query(self, addresses)
            .await?
            .matches
            .into_iter()
            .collect())
    }
}

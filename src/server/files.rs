//! Filesystem layout of an OpenRCT2 userdata directory.

use super::ServerError;
use config::{Config, File, FileFormat, Value};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::SystemTime,
};

const CONFIG_FILE: &str = "config.ini";
const AUTOSAVE_DIR: &str = "save/autosave";
/// Prefix of autosaves which were put aside and must not be resumed.
pub const ROTATED_PREFIX: &str = "dsc_";
const SCENARIO_EXTENSIONS: [&str; 5] = ["sv4", "sc4", "sv6", "sc6", "park"];

/// Reads `key` from the `config.ini` inside `dir`, regardless of the section it lives in.
pub async fn read_config(dir: &Path, key: &str) -> Result<String, ServerError> {
    let path = dir.join(CONFIG_FILE);
    let missing = |reason: String| ServerError::Config {
        path: path.clone(),
        key: key.to_string(),
        reason,
    };

    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| missing(e.to_string()))?;
    let config = Config::builder()
        .add_source(File::from_str(&text, FileFormat::Ini))
        .build()
        .map_err(|e| missing(e.to_string()))?;

    if let Ok(value) = config.get_string(key) {
        return Ok(value);
    }

    let sections = config
        .try_deserialize::<HashMap<String, Value>>()
        .map_err(|e| missing(e.to_string()))?;
    for section in sections.into_values() {
        if let Ok(table) = section.into_table() {
            if let Some(value) = table.get(key) {
                return value.clone().into_string().map_err(|e| missing(e.to_string()));
            }
        }
    }

    Err(missing("key not found".to_string()))
}

/// Reads the port a server is listening on.
pub async fn read_port(dir: &Path) -> Result<u16, ServerError> {
    let value = read_config(dir, "default_port").await?;
    value.trim().parse().map_err(|_| ServerError::Config {
        path: dir.join(CONFIG_FILE),
        key: "default_port".to_string(),
        reason: format!("`{}` is not a port", value),
    })
}

/// Finds the directory of an additional server (`s<N>-...`) inside the primary one.
pub async fn find_server_dir(root: &Path, slot: u32) -> Option<PathBuf> {
    let prefix = format!("s{}-", slot);
    let mut entries = tokio::fs::read_dir(root).await.ok()?;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir && entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Some(entry.path());
        }
    }

    None
}

pub fn autosave_dir(dir: &Path) -> PathBuf {
    dir.join(AUTOSAVE_DIR)
}

/// Autosaves which can be resumed, newest first.
pub async fn autosaves(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(autosave_dir(dir)).await?;
    let mut saves: Vec<(SystemTime, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let rotated = entry
            .file_name()
            .to_string_lossy()
            .starts_with(ROTATED_PREFIX);
        if metadata.is_file() && !rotated {
            saves.push((metadata.modified()?, entry.path()));
        }
    }

    saves.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(saves.into_iter().map(|(_, path)| path).collect())
}

/// Newest autosave, if there is one.
pub async fn latest_autosave(dir: &Path) -> Option<PathBuf> {
    match autosaves(dir).await {
        Ok(saves) => saves.into_iter().next(),
        Err(e) => {
            log::debug!("No autosaves in {}: {}", dir.display(), e);
            None
        }
    }
}

/// Puts the newest autosave aside so the next resume falls back to an older one.
/// Keeps the autosave if it is the only one left.
pub async fn rotate_autosave(dir: &Path) -> Result<Option<PathBuf>, ServerError> {
    let saves = match autosaves(dir).await {
        Ok(saves) => saves,
        Err(_) => return Ok(None),
    };
    if saves.len() < 2 {
        return Ok(None);
    }

    let newest = &saves[0];
    let name = newest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rotated = newest.with_file_name(format!("{}{}", ROTATED_PREFIX, name));
    tokio::fs::rename(newest, &rotated).await?;

    Ok(Some(rotated))
}

/// Scenario files in `dir` whose name contains `search` (case insensitive).
pub async fn find_scenarios(dir: &Path, search: &str) -> std::io::Result<Vec<String>> {
    let search = search.to_lowercase();
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_scenario = path
            .extension()
            .map(|ext| {
                SCENARIO_EXTENSIONS
                    .iter()
                    .any(|known| ext.to_string_lossy().eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if !is_scenario {
            continue;
        }
        if display_name(&path).to_lowercase().contains(&search) {
            if let Some(name) = path.file_name() {
                found.push(name.to_string_lossy().into_owned());
            }
        }
    }

    found.sort();
    Ok(found)
}

/// File name without extension.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    pub fn write_config(dir: &Path, port: u16) {
        std::fs::write(
            dir.join(CONFIG_FILE),
            format!(
                "[general]\nlanguage = \"en-GB\"\n\n[network]\nplayer_name = \"Bot\"\ndefault_port = {}\n",
                port
            ),
        )
        .unwrap();
    }

    /// Creates autosaves with increasing modification times.
    pub fn write_autosaves(dir: &Path, names: &[&str]) {
        let autosaves = autosave_dir(dir);
        std::fs::create_dir_all(&autosaves).unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for (i, name) in names.iter().enumerate() {
            let path = autosaves.join(name);
            std::fs::write(&path, b"park").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(60 * i as u64))
                .unwrap();
        }
    }

    #[tokio::test]
    async fn port_is_read_from_any_section() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), 11753);

        assert_eq!(read_port(dir.path()).await.unwrap(), 11753);
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            read_port(dir.path()).await,
            Err(ServerError::Config { .. })
        ));

        std::fs::write(dir.path().join(CONFIG_FILE), "[network]\nplayer_name = x\n").unwrap();
        assert!(matches!(
            read_config(dir.path(), "default_port").await,
            Err(ServerError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn newest_autosave_wins_and_rotated_ones_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_autosaves(dir.path(), &["autosave_1.park", "autosave_2.park"]);

        let latest = latest_autosave(dir.path()).await.unwrap();
        assert_eq!(latest.file_name().unwrap(), "autosave_2.park");

        let rotated = rotate_autosave(dir.path()).await.unwrap().unwrap();
        assert_eq!(rotated.file_name().unwrap(), "dsc_autosave_2.park");

        let latest = latest_autosave(dir.path()).await.unwrap();
        assert_eq!(latest.file_name().unwrap(), "autosave_1.park");
    }

    #[tokio::test]
    async fn last_autosave_is_never_rotated() {
        let dir = tempfile::tempdir().unwrap();
        write_autosaves(dir.path(), &["autosave_1.park"]);

        assert!(rotate_autosave(dir.path()).await.unwrap().is_none());
        assert!(latest_autosave(dir.path()).await.is_some());
    }

    #[tokio::test]
    async fn no_autosave_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(latest_autosave(dir.path()).await.is_none());
        assert!(rotate_autosave(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_dirs_are_matched_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("s2-nostalgia")).unwrap();
        std::fs::create_dir(dir.path().join("s12-other")).unwrap();

        let found = find_server_dir(dir.path(), 2).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "s2-nostalgia");
        assert!(find_server_dir(dir.path(), 3).await.is_none());
    }

    #[tokio::test]
    async fn scenarios_are_searched_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Forest Frontiers.SC6", "Dynamite Dunes.sc4", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        assert_eq!(
            find_scenarios(dir.path(), "forest").await.unwrap(),
            vec!["Forest Frontiers.SC6".to_string()]
        );
        assert_eq!(find_scenarios(dir.path(), "").await.unwrap().len(), 2);
    }
}

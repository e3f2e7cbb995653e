// src/session/auth_store.rs
use std::path::{Path, PathBuf};

use tokio::fs;

use super::SessionError;
use super::connector::AuthState;

/// Penyimpanan kredensial multi-file: satu `<key>.json` per entri.
#[derive(Debug, Clone)]
pub struct AuthStore {
    dir: PathBuf,
}

impl AuthStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn load(&self) -> Result<AuthState, SessionError> {
        let mut state = AuthState::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(state),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let raw = fs::read(&path).await?;
            match serde_json::from_slice(&raw) {
                Ok(value) => {
                    state.insert(key.to_string(), value);
                }
                Err(e) => {
                    log::warn!("File kredensial {} rusak, dilewati: {}", path.display(), e);
                }
            }
        }

        Ok(state)
    }

    /// Gabungkan `update` ke state tersimpan. Nilai `null` menghapus entrinya.
    pub async fn save(&self, update: &AuthState) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir).await?;

        for (key, value) in update {
            let path = self.dir.join(format!("{}.json", file_name(key)));

            if value.is_null() {
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            // Tulis ke file sementara lalu rename supaya tidak setengah jadi
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
            fs::rename(&tmp, &path).await?;
        }

        Ok(())
    }
}

fn file_name(key: &str) -> String {
    key.replace(['/', ':'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_directory_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AuthStore::new(tmp.path().join("belum-ada"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updates_are_merged_per_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AuthStore::new(tmp.path());

        let mut first = AuthState::new();
        first.insert("creds".into(), json!({ "token": "a" }));
        first.insert("pre-key-1".into(), json!({ "k": 1 }));
        store.save(&first).await.unwrap();

        let mut second = AuthState::new();
        second.insert("creds".into(), json!({ "token": "b" }));
        store.save(&second).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded["creds"], json!({ "token": "b" }));
        assert_eq!(loaded["pre-key-1"], json!({ "k": 1 }));
    }

    #[tokio::test]
    async fn null_value_removes_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AuthStore::new(tmp.path());

        let mut state = AuthState::new();
        state.insert("session-abc".into(), json!({ "x": true }));
        store.save(&state).await.unwrap();

        state.insert("session-abc".into(), serde_json::Value::Null);
        store.save(&state).await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_are_sanitized_and_junk_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AuthStore::new(tmp.path());

        let mut state = AuthState::new();
        state.insert("app-state:sync/key".into(), json!(1));
        store.save(&state).await.unwrap();

        std::fs::write(tmp.path().join("catatan.txt"), "bukan json").unwrap();
        std::fs::write(tmp.path().join("rusak.json"), "{").unwrap();

        assert!(tmp.path().join("app-state-sync-key.json").exists());
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["app-state-sync-key"], json!(1));
    }
}

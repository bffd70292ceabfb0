use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{CacheError, CacheResult};

use super::Store;

/// A file-per-entry [`Store`]: each key becomes one JSON file named
/// `base64url(utf8(key)) + extension` inside `directory`.
///
/// Grounded on §6's persisted-format contract. Parse failures are
/// self-healing: `get` deletes the offending file and reports absent rather
/// than surfacing the parse error, matching §7's `Corrupt` policy.
pub struct FileStore<V> {
    directory: PathBuf,
    extension: String,
    _value: PhantomData<V>,
}

impl<V> FileStore<V> {
    /// Uses the default `.cache` extension.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_extension(directory, "cache")
    }

    pub fn with_extension(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
            _value: PhantomData,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        self.directory.join(format!("{encoded}.{}", self.extension))
    }

    fn key_from_path(&self, path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        let decoded = URL_SAFE_NO_PAD.decode(stem).ok()?;
        String::from_utf8(decoded).ok()
    }

    async fn ensure_directory(&self) -> CacheResult<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        Ok(())
    }
}

/// On-disk representation of an [`Entry`], matching §6's persisted format.
#[derive(Serialize, Deserialize)]
struct PersistedEntry<V> {
    value: V,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Converts between [`std::time::Instant`] (the in-process clock `Entry`
/// uses) and [`std::time::SystemTime`]/[`chrono::DateTime`] (the wall-clock
/// form persisted to disk), anchored at the moment of conversion.
fn instant_to_datetime(instant: Instant) -> DateTime<Utc> {
    let now_instant = Instant::now();
    let now_system = SystemTime::now();
    let system_time = if instant <= now_instant {
        now_system - now_instant.duration_since(instant)
    } else {
        now_system + instant.duration_since(now_instant)
    };
    DateTime::<Utc>::from(system_time)
}

fn datetime_to_instant(datetime: DateTime<Utc>) -> Instant {
    let now_instant = Instant::now();
    let now_system = SystemTime::now();
    let target_system: SystemTime = datetime.into();
    match target_system.duration_since(now_system) {
        Ok(ahead) => now_instant + ahead,
        Err(err) => now_instant.checked_sub(err.duration()).unwrap_or(now_instant),
    }
}

impl<V: Serialize> PersistedEntry<V> {
    fn from_entry(entry: &Entry<V>) -> Self
    where
        V: Clone,
    {
        Self {
            value: entry.value.clone(),
            created_at: instant_to_datetime(entry.created_at),
            expires_at: entry.expires_at.map(instant_to_datetime),
        }
    }
}

impl<V> PersistedEntry<V> {
    fn into_entry(self) -> Entry<V> {
        Entry {
            value: self.value,
            created_at: datetime_to_instant(self.created_at),
            expires_at: self.expires_at.map(datetime_to_instant),
        }
    }
}

#[async_trait]
impl<V> Store<V> for FileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    async fn put(&self, key: &str, entry: Entry<V>) -> CacheResult<()> {
        self.ensure_directory().await?;
        let persisted = PersistedEntry::from_entry(&entry);
        let json = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| CacheError::Corrupt(format!("failed to encode entry for {key}: {e}")))?;
        tokio::fs::write(self.path_for(key), json).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Entry<V>>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<PersistedEntry<V>>(&bytes) {
            Ok(persisted) => Ok(Some(persisted.into_entry())),
            Err(_) => {
                tracing::warn!(path = %path.display(), "deleting corrupt cache file");
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &str) -> CacheResult<Option<Entry<V>>> {
        let existing = self.get(key).await?;
        if existing.is_some() {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(existing)
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        self.ensure_directory().await?;
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if let Some(key) = self.key_from_path(&entry.path()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn contains_key(&self, key: &str) -> CacheResult<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await.unwrap_or(false))
    }

    async fn clear(&self) -> CacheResult<()> {
        for key in self.keys().await? {
            match tokio::fs::remove_file(self.path_for(&key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn len(&self) -> CacheResult<u64> {
        Ok(self.keys().await?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cachecore-filestore-test-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = temp_dir("roundtrip");
        let store: FileStore<String> = FileStore::new(&dir);
        store
            .put("greeting", Entry::with_ttl("hello".to_string(), Duration::from_secs(60)))
            .await
            .unwrap();

        let fetched = store.get("greeting").await.unwrap().unwrap();
        assert_eq!(fetched.value, "hello");
        assert!(fetched.expires_at.is_some());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn corrupt_file_self_heals_on_get() {
        let dir = temp_dir("corrupt");
        let store: FileStore<String> = FileStore::new(&dir);
        store.ensure_directory().await.unwrap();
        tokio::fs::write(store.path_for("bad"), b"not json").await.unwrap();

        let result = store.get("bad").await.unwrap();
        assert!(result.is_none());
        assert!(!tokio::fs::try_exists(store.path_for("bad")).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn missing_key_is_a_clean_miss() {
        let dir = temp_dir("missing");
        let store: FileStore<i32> = FileStore::new(&dir);
        assert!(store.get("nope").await.unwrap().is_none());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn clear_removes_every_file() {
        let dir = temp_dir("clear");
        let store: FileStore<i32> = FileStore::new(&dir);
        store.put("a", Entry::permanent(1)).await.unwrap();
        store.put("b", Entry::permanent(2)).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}

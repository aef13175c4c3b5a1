use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

/// String records under fixed keys, one namespace per user.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: Uuid, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, scope: Uuid, key: &str, value: String) -> anyhow::Result<()>;
}

/// Durable records stored as `<root>/<scope>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FsKeyValueStore {
    root: PathBuf,
}

impl FsKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, scope: Uuid, key: &str) -> PathBuf {
        self.root.join(scope.to_string()).join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FsKeyValueStore {
    async fn get(&self, scope: Uuid, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path(scope, key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn set(&self, scope: Uuid, key: &str, value: String) -> anyhow::Result<()> {
        let path = self.path(scope, key);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }
        // Atomic replace: readers see the old or the new record, never a partial one.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename {}", path.display()))?;
        Ok(())
    }
}

/// Volatile store for tests and `AppState::fake`.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    records: Mutex<HashMap<(Uuid, String), String>>,
    fail_writes: AtomicBool,
    writes_until_failure: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail until switched back.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes only the `n`th `set` from now fail (1 = the next one).
    pub fn fail_nth_write(&self, n: usize) {
        self.writes_until_failure.store(n, Ordering::SeqCst);
    }

    fn write_rejected(&self) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            return true;
        }
        let countdown = self
            .writes_until_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        countdown == Ok(1)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, scope: Uuid, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.records.lock().await.get(&(scope, key.to_string())).cloned())
    }

    async fn set(&self, scope: Uuid, key: &str, value: String) -> anyhow::Result<()> {
        if self.write_rejected() {
            anyhow::bail!("write to {key} rejected");
        }
        self.records
            .lock()
            .await
            .insert((scope, key.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_roundtrips_and_scopes_by_user() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FsKeyValueStore::new(dir.path());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert_eq!(kv.get(alice, "nutrilens_profile").await.unwrap(), None);
        kv.set(alice, "nutrilens_profile", "{\"a\":1}".into())
            .await
            .unwrap();
        kv.set(alice, "nutrilens_profile", "{\"a\":2}".into())
            .await
            .unwrap();

        assert_eq!(
            kv.get(alice, "nutrilens_profile").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );
        assert_eq!(kv.get(bob, "nutrilens_profile").await.unwrap(), None);
        assert!(dir
            .path()
            .join(alice.to_string())
            .join("nutrilens_profile.json")
            .exists());
    }

    #[tokio::test]
    async fn memory_store_can_refuse_writes() {
        let kv = MemoryKeyValueStore::new();
        let user = Uuid::new_v4();
        kv.set(user, "k", "v1".into()).await.unwrap();
        kv.fail_writes(true);
        assert!(kv.set(user, "k", "v2".into()).await.is_err());
        assert_eq!(kv.get(user, "k").await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn memory_store_can_refuse_one_write() {
        let kv = MemoryKeyValueStore::new();
        let user = Uuid::new_v4();
        kv.fail_nth_write(2);
        kv.set(user, "k", "v1".into()).await.unwrap();
        assert!(kv.set(user, "k", "v2".into()).await.is_err());
        kv.set(user, "k", "v3".into()).await.unwrap();
        assert_eq!(kv.get(user, "k").await.unwrap().as_deref(), Some("v3"));
    }
}

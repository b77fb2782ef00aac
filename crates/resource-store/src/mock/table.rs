//! In-memory object table with API-server-like write semantics

use crate::error::StoreError;
use chrono::{SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One kind's objects, keyed by `namespace/name` (or `name` when cluster-scoped)
#[derive(Debug)]
pub(crate) struct Table<K> {
    kind: &'static str,
    objects: Arc<Mutex<BTreeMap<String, K>>>,
    versions: Arc<Mutex<u64>>,
}

impl<K> Clone for Table<K> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            objects: Arc::clone(&self.objects),
            versions: Arc::clone(&self.versions),
        }
    }
}

pub(crate) fn key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}

/// Current time as a metadata timestamp, built through its RFC 3339 wire form
fn now() -> Option<Time> {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    serde_json::from_value(serde_json::Value::String(stamp)).ok()
}

fn object_key<K: Resource>(obj: &K) -> String {
    key(obj.meta().namespace.as_deref(), obj.meta().name.as_deref().unwrap_or_default())
}

impl<K> Table<K>
where
    K: Resource + Clone,
{
    pub(crate) fn new(kind: &'static str, versions: Arc<Mutex<u64>>) -> Self {
        Self {
            kind,
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            versions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, K>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_version(&self) -> String {
        let mut v = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        *v += 1;
        v.to_string()
    }

    fn not_found(&self, key: &str) -> StoreError {
        StoreError::NotFound {
            kind: self.kind,
            name: key.to_string(),
        }
    }

    fn conflict(&self, key: &str) -> StoreError {
        StoreError::Conflict {
            kind: self.kind,
            name: key.to_string(),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Result<K, StoreError> {
        self.lock().get(key).cloned().ok_or_else(|| self.not_found(key))
    }

    pub(crate) fn list(&self) -> Vec<K> {
        self.lock().values().cloned().collect()
    }

    /// Insert as the API server would on create: fresh uid, version and
    /// creation timestamp. Fails if the key is taken.
    pub(crate) fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = object_key(obj);
        let mut objects = self.lock();
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: self.kind,
                name: key,
            });
        }
        let mut stored = obj.clone();
        let meta = stored.meta_mut();
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.resource_version = Some(self.next_version());
        meta.creation_timestamp = now();
        meta.deletion_timestamp = None;
        objects.insert(key, stored.clone());
        Ok(stored)
    }

    /// Apply `write` to the stored copy of `obj` if `obj` carries the current
    /// resourceVersion. Objects left with a deletion timestamp and no
    /// finalizers are purged.
    pub(crate) fn update(&self, obj: &K, write: impl FnOnce(&mut K, &K)) -> Result<K, StoreError> {
        let key = object_key(obj);
        let mut objects = self.lock();
        let current = objects.get_mut(&key).ok_or_else(|| self.not_found(&key))?;
        if current.resource_version() != obj.resource_version() {
            return Err(self.conflict(&key));
        }
        write(current, obj);
        current.meta_mut().resource_version = Some(self.next_version());
        let updated = current.clone();
        if updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            objects.remove(&key);
        }
        Ok(updated)
    }

    /// Delete by key. Objects holding finalizers only get a deletion
    /// timestamp. `preconditions` are (uid, resourceVersion) when given.
    pub(crate) fn delete(
        &self,
        key: &str,
        preconditions: Option<(Option<String>, Option<String>)>,
    ) -> Result<(), StoreError> {
        let mut objects = self.lock();
        let current = objects.get_mut(key).ok_or_else(|| self.not_found(key))?;
        if let Some((uid, version)) = preconditions {
            let uid_mismatch = uid.is_some_and(|u| current.uid().as_deref() != Some(u.as_str()));
            let version_mismatch =
                version.is_some_and(|v| current.resource_version().as_deref() != Some(v.as_str()));
            if uid_mismatch || version_mismatch {
                return Err(self.conflict(key));
            }
        }
        if current.finalizers().is_empty() {
            objects.remove(key);
            return Ok(());
        }
        if current.meta().deletion_timestamp.is_none() {
            current.meta_mut().deletion_timestamp = now();
            current.meta_mut().resource_version = Some(self.next_version());
        }
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

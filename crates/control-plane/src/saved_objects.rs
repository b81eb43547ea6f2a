use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::spaces::Namespace;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub namespace: Option<Namespace>,
    pub attributes: Value,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("saved object [{object_type}/{id}] not found")]
    NotFound { object_type: String, id: String },
    #[error("saved object [{object_type}/{id}] conflict")]
    Conflict { object_type: String, id: String },
    #[error("store error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Namespaced persistent object store.
///
/// `update` merges the top-level keys of `attributes` into the stored object
/// and fails with `Conflict` when `version` is given and stale.
pub trait SavedObjectsClient: Send + Sync {
    fn create(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: Option<&str>,
        attributes: Value,
    ) -> Result<SavedObject, StoreError>;

    fn get(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<SavedObject, StoreError>;

    fn update(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
        attributes: Value,
        version: Option<u64>,
    ) -> Result<SavedObject, StoreError>;

    fn delete(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<(), StoreError>;

    fn find(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
    ) -> Result<Vec<SavedObject>, StoreError>;
}

fn type_prefix(namespace: Option<&Namespace>, object_type: &str) -> String {
    let namespace = namespace.map(Namespace::as_str).unwrap_or("");
    format!("{namespace}\u{1f}{object_type}\u{1f}")
}

fn object_key(namespace: Option<&Namespace>, object_type: &str, id: &str) -> String {
    format!("{}{id}", type_prefix(namespace, object_type))
}

fn new_object(
    namespace: Option<&Namespace>,
    object_type: &str,
    id: Option<&str>,
    attributes: Value,
) -> SavedObject {
    SavedObject {
        id: id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        object_type: object_type.to_string(),
        namespace: namespace.cloned(),
        attributes,
        version: 1,
        updated_at: Utc::now(),
    }
}

fn apply_update(
    object: &mut SavedObject,
    attributes: Value,
    version: Option<u64>,
) -> Result<(), StoreError> {
    if let Some(expected) = version {
        if expected != object.version {
            return Err(StoreError::Conflict {
                object_type: object.object_type.clone(),
                id: object.id.clone(),
            });
        }
    }
    match (&mut object.attributes, attributes) {
        (Value::Object(existing), Value::Object(patch)) => {
            for (key, value) in patch {
                existing.insert(key, value);
            }
        }
        (slot, replacement) => *slot = replacement,
    }
    object.version += 1;
    object.updated_at = Utc::now();
    Ok(())
}

fn not_found(object_type: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        object_type: object_type.to_string(),
        id: id.to_string(),
    }
}

#[derive(Clone, Default)]
pub struct InMemorySavedObjects {
    objects: Arc<RwLock<BTreeMap<String, SavedObject>>>,
}

impl InMemorySavedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl SavedObjectsClient for InMemorySavedObjects {
    fn create(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: Option<&str>,
        attributes: Value,
    ) -> Result<SavedObject, StoreError> {
        let object = new_object(namespace, object_type, id, attributes);
        let key = object_key(namespace, object_type, &object.id);
        let mut objects = self.objects.write();
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict {
                object_type: object_type.to_string(),
                id: object.id,
            });
        }
        objects.insert(key, object.clone());
        Ok(object)
    }

    fn get(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<SavedObject, StoreError> {
        self.objects
            .read()
            .get(&object_key(namespace, object_type, id))
            .cloned()
            .ok_or_else(|| not_found(object_type, id))
    }

    fn update(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
        attributes: Value,
        version: Option<u64>,
    ) -> Result<SavedObject, StoreError> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(&object_key(namespace, object_type, id))
            .ok_or_else(|| not_found(object_type, id))?;
        apply_update(object, attributes, version)?;
        Ok(object.clone())
    }

    fn delete(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        self.objects
            .write()
            .remove(&object_key(namespace, object_type, id))
            .map(|_| ())
            .ok_or_else(|| not_found(object_type, id))
    }

    fn find(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
    ) -> Result<Vec<SavedObject>, StoreError> {
        let prefix = type_prefix(namespace, object_type);
        Ok(self
            .objects
            .read()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, object)| object.clone())
            .collect())
    }
}

#[derive(Clone)]
pub struct SledSavedObjects {
    db: sled::Db,
}

impl SledSavedObjects {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(Self { db })
    }

    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        Ok(Self { db })
    }

    fn read(&self, key: &str) -> Result<Option<(sled::IVec, SavedObject)>, StoreError> {
        let Some(value) = self.db.get(key.as_bytes()).map_err(store_err)? else {
            return Ok(None);
        };
        let object = decode(&value)?;
        Ok(Some((value, object)))
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(store_err)?;
        Ok(())
    }
}

fn store_err(err: sled::Error) -> StoreError {
    StoreError::Store(err.to_string())
}

fn encode(object: &SavedObject) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(object).map_err(|err| StoreError::Serialization(err.to_string()))
}

fn decode(value: &[u8]) -> Result<SavedObject, StoreError> {
    serde_json::from_slice(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

impl SavedObjectsClient for SledSavedObjects {
    fn create(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: Option<&str>,
        attributes: Value,
    ) -> Result<SavedObject, StoreError> {
        let object = new_object(namespace, object_type, id, attributes);
        let key = object_key(namespace, object_type, &object.id);
        let swapped = self
            .db
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(encode(&object)?))
            .map_err(store_err)?;
        if swapped.is_err() {
            return Err(StoreError::Conflict {
                object_type: object_type.to_string(),
                id: object.id,
            });
        }
        self.flush()?;
        Ok(object)
    }

    fn get(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<SavedObject, StoreError> {
        self.read(&object_key(namespace, object_type, id))?
            .map(|(_, object)| object)
            .ok_or_else(|| not_found(object_type, id))
    }

    fn update(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
        attributes: Value,
        version: Option<u64>,
    ) -> Result<SavedObject, StoreError> {
        let key = object_key(namespace, object_type, id);
        // Unversioned updates retry against the newer value; versioned ones fail.
        loop {
            let (current, mut object) =
                self.read(&key)?.ok_or_else(|| not_found(object_type, id))?;
            apply_update(&mut object, attributes.clone(), version)?;
            let swapped = self
                .db
                .compare_and_swap(key.as_bytes(), Some(&current), Some(encode(&object)?))
                .map_err(store_err)?;
            match swapped {
                Ok(()) => {
                    self.flush()?;
                    return Ok(object);
                }
                Err(_) if version.is_some() => {
                    return Err(StoreError::Conflict {
                        object_type: object_type.to_string(),
                        id: id.to_string(),
                    });
                }
                Err(_) => continue,
            }
        }
    }

    fn delete(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        let removed = self
            .db
            .remove(object_key(namespace, object_type, id).as_bytes())
            .map_err(store_err)?;
        if removed.is_none() {
            return Err(not_found(object_type, id));
        }
        Ok(())
    }

    fn find(
        &self,
        namespace: Option<&Namespace>,
        object_type: &str,
    ) -> Result<Vec<SavedObject>, StoreError> {
        let prefix = type_prefix(namespace, object_type);
        let mut objects = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry.map_err(store_err)?;
            objects.push(decode(&value)?);
        }
        Ok(objects)
    }
}

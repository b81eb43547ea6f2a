use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::actions::{load_preconfigured_actions, PreconfiguredAction};
use crate::audit::{AuditSink, InMemoryAuditSink};
use crate::cluster_security::{ClusterSecurityAuthority, ClusterSecurityConfig};
use crate::config::{ConfigError, SystemConfig};
use crate::encrypted_objects::{CryptoError, EncryptedSavedObjects};
use crate::rule_types::RuleTypeRegistry;
use crate::saved_objects::{
    InMemorySavedObjects, SavedObjectsClient, SledSavedObjects, StoreError,
};
use crate::security::{
    InternalIdentity, SecurityAuthority, SecurityError, StaticSecurityAuthority, TokenRecord,
};
use crate::spaces::{
    default_namespace_resolver, path_space_resolver, NamespaceResolver, SpaceResolver,
    DEFAULT_SPACE_ID,
};
use crate::tasks::{InMemoryTaskManager, TaskManager};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Long-lived collaborators of the alerting plane, built once at startup.
pub struct ControlPlaneBundle {
    pub security: Option<Arc<dyn SecurityAuthority>>,
    pub internal_identity: InternalIdentity,
    pub saved_objects: Arc<dyn SavedObjectsClient>,
    pub encrypted_objects: Arc<EncryptedSavedObjects>,
    pub tasks: Arc<dyn TaskManager>,
    pub rule_types: Arc<RuleTypeRegistry>,
    pub preconfigured_actions: Vec<PreconfiguredAction>,
    pub audit: Arc<dyn AuditSink>,
    pub default_space_id: String,
}

impl ControlPlaneBundle {
    /// Everything in memory and no security subsystem.
    pub fn in_memory() -> Self {
        Self {
            security: None,
            internal_identity: InternalIdentity::new("alerting_system"),
            saved_objects: InMemorySavedObjects::shared(),
            encrypted_objects: Arc::new(EncryptedSavedObjects::ephemeral()),
            tasks: InMemoryTaskManager::shared(),
            rule_types: RuleTypeRegistry::shared(),
            preconfigured_actions: Vec::new(),
            audit: InMemoryAuditSink::shared(),
            default_space_id: DEFAULT_SPACE_ID.to_string(),
        }
    }

    pub fn space_resolver(&self) -> SpaceResolver {
        path_space_resolver(self.default_space_id.clone())
    }

    pub fn namespace_resolver(&self) -> NamespaceResolver {
        default_namespace_resolver(self.default_space_id.clone())
    }
}

pub fn load_from_system_config(
    config: &SystemConfig,
) -> Result<ControlPlaneBundle, BootstrapError> {
    let internal_identity = InternalIdentity::new(config.get_string("security.internal_user"));
    let security = resolve_security(config, &internal_identity)?;
    let preconfigured_actions = match config.get_path("actions.preconfigured_file") {
        Some(path) => load_preconfigured_actions(&path)?,
        None => Vec::new(),
    };
    info!(
        security = security.is_some(),
        preconfigured_actions = preconfigured_actions.len(),
        "alerting control plane loaded"
    );

    Ok(ControlPlaneBundle {
        security,
        internal_identity,
        saved_objects: resolve_saved_objects(config)?,
        encrypted_objects: Arc::new(resolve_encryption(config)?),
        tasks: InMemoryTaskManager::shared(),
        rule_types: RuleTypeRegistry::shared(),
        preconfigured_actions,
        audit: InMemoryAuditSink::shared(),
        default_space_id: config.get_string("spaces.default_space_id"),
    })
}

fn resolve_security(
    config: &SystemConfig,
    internal: &InternalIdentity,
) -> Result<Option<Arc<dyn SecurityAuthority>>, BootstrapError> {
    if !config.get_bool("security.enabled") {
        return Ok(None);
    }
    let api_keys_enabled = config.get_bool("security.api_keys_enabled");

    if let Some(base_url) = config.get_non_empty("security.cluster_url") {
        let timeout_ms = config.get_number("security.timeout_ms");
        let authority = ClusterSecurityAuthority::new(ClusterSecurityConfig {
            base_url,
            internal: internal.clone(),
            username: config.get_string("security.cluster_username"),
            password: config.get_string("security.cluster_password"),
            timeout_ms: if timeout_ms <= 0 { 30_000 } else { timeout_ms as u64 },
            api_keys_enabled,
        })?;
        return Ok(Some(Arc::new(authority)));
    }

    let records = match config.get_path("security.users_file") {
        Some(path) => load_token_records(&path)?,
        None => Vec::new(),
    };
    Ok(Some(Arc::new(StaticSecurityAuthority::from_records(
        &records,
        internal.clone(),
        api_keys_enabled,
    ))))
}

fn resolve_saved_objects(
    config: &SystemConfig,
) -> Result<Arc<dyn SavedObjectsClient>, BootstrapError> {
    match config.get_non_empty("storage.sled_path") {
        Some(path) => Ok(Arc::new(SledSavedObjects::open(&path)?)),
        None => Ok(InMemorySavedObjects::shared()),
    }
}

fn resolve_encryption(config: &SystemConfig) -> Result<EncryptedSavedObjects, BootstrapError> {
    match config.get_non_empty("encryption.key") {
        Some(key) => Ok(EncryptedSavedObjects::from_encoded_key(&key)?),
        None => {
            warn!("encryption.key not set, encrypted attributes will not survive a restart");
            Ok(EncryptedSavedObjects::ephemeral())
        }
    }
}

pub fn load_token_records(path: &Path) -> Result<Vec<TokenRecord>, BootstrapError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| BootstrapError::Io(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&raw).map_err(|err| BootstrapError::Parse(err.to_string()))
}

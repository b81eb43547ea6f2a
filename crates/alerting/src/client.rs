use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use control_plane::{
    find_preconfigured, ApiKeyGrant, AttributeDescriptor, CryptoError, EncryptedSavedObjects,
    InvalidateApiKeyParams, Namespace, PreconfiguredActions, RuleType, RuleTypeError,
    RuleTypeRegistry, SavedObject, SavedObjectsClient, SecurityError, SpaceId, StoreError,
    TaskError, TaskInstance, TaskManager,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::credentials::{CredentialResult, RequestCapabilities};
use crate::factory::ClientConfiguration;
use crate::types::{
    parse_interval, CreateRuleData, FindResult, ResolvedRuleAction, Rule, RuleAction,
    RuleAttributes, UpdateRuleData, ACTION_SAVED_OBJECT_TYPE, RULE_SAVED_OBJECT_TYPE,
};

#[derive(Debug, Error)]
pub enum AlertsClientError {
    #[error(transparent)]
    RuleType(#[from] RuleTypeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("invalid schedule interval \"{0}\"")]
    InvalidInterval(String),
    #[error("invalid action group \"{0}\"")]
    InvalidActionGroup(String),
    #[error("action \"{0}\" not found")]
    UnknownAction(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AlertsClientError {
    fn from(err: serde_json::Error) -> Self {
        AlertsClientError::Serialization(err.to_string())
    }
}

/// Rule CRUD and scheduling for one space and one caller.
pub struct AlertsClient {
    space_id: Option<SpaceId>,
    namespace: Option<Namespace>,
    logger: Span,
    task_manager: Arc<dyn TaskManager>,
    rule_types: Arc<RuleTypeRegistry>,
    saved_objects: Arc<dyn SavedObjectsClient>,
    encrypted_objects: Arc<EncryptedSavedObjects>,
    capabilities: RequestCapabilities,
    preconfigured_actions: PreconfiguredActions,
}

impl AlertsClient {
    pub fn new(config: ClientConfiguration) -> Self {
        Self {
            space_id: config.space_id,
            namespace: config.namespace,
            logger: config.logger,
            task_manager: config.task_manager,
            rule_types: config.rule_types,
            saved_objects: config.saved_objects,
            encrypted_objects: config.encrypted_objects,
            capabilities: config.capabilities,
            preconfigured_actions: config.preconfigured_actions,
        }
    }

    pub fn space_id(&self) -> Option<&SpaceId> {
        self.space_id.as_ref()
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub fn capabilities(&self) -> &RequestCapabilities {
        &self.capabilities
    }

    pub fn list_rule_types(&self) -> Vec<RuleType> {
        self.rule_types.list()
    }

    pub async fn create(&self, data: CreateRuleData) -> Result<Rule, AlertsClientError> {
        let rule_type = self.rule_types.get(&data.alert_type_id)?;
        validate_interval(&data.schedule.interval)?;
        let actions = self.resolve_actions(&rule_type, &data.actions)?;

        let id = Uuid::new_v4().to_string();
        let username = self.capabilities.get_user_name().await?;
        let grant = if data.enabled {
            self.capabilities.create_api_key().await?.into_result()
        } else {
            None
        };
        let now = Utc::now();
        let mut attributes = RuleAttributes {
            name: data.name,
            tags: data.tags,
            alert_type_id: data.alert_type_id,
            consumer: data.consumer,
            schedule: data.schedule,
            params: data.params,
            actions,
            enabled: data.enabled,
            throttle: data.throttle,
            api_key: None,
            api_key_owner: grant.as_ref().and(username.clone()),
            created_by: username.clone(),
            updated_by: username,
            created_at: now,
            updated_at: now,
            scheduled_task_id: None,
            mute_all: false,
            muted_instance_ids: Vec::new(),
        };
        let created = match self.store_new_rule(&id, &mut attributes, grant.as_ref()) {
            Ok(created) => created,
            Err(err) => {
                warn!(parent: &self.logger, rule_id = %id, error = %err, "failed to save rule");
                self.discard_grant(&id, grant).await;
                return Err(err);
            }
        };
        info!(
            parent: &self.logger,
            rule_id = %id,
            space_id = ?self.space_id,
            rule_type = %attributes.alert_type_id,
            "rule created"
        );
        if !attributes.enabled {
            return self.to_rule(created);
        }

        let scheduled = self
            .schedule_task(&id, &attributes.alert_type_id)
            .and_then(|task_id| {
                self.saved_objects
                    .update(
                        self.namespace.as_ref(),
                        RULE_SAVED_OBJECT_TYPE,
                        &id,
                        json!({ "scheduledTaskId": task_id }),
                        None,
                    )
                    .map_err(|err| {
                        self.remove_task_quietly(&id, &task_id);
                        AlertsClientError::from(err)
                    })
            });
        match scheduled {
            Ok(updated) => self.to_rule(updated),
            Err(err) => {
                warn!(
                    parent: &self.logger,
                    rule_id = %id,
                    error = %err,
                    "scheduling failed, rolling back rule"
                );
                if let Err(delete_err) =
                    self.saved_objects
                        .delete(self.namespace.as_ref(), RULE_SAVED_OBJECT_TYPE, &id)
                {
                    warn!(
                        parent: &self.logger,
                        rule_id = %id,
                        error = %delete_err,
                        "failed to roll back rule"
                    );
                }
                self.discard_grant(&id, grant).await;
                Err(err)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Rule, AlertsClientError> {
        let object = self.load(id)?;
        self.to_rule(object)
    }

    pub async fn find(&self) -> Result<FindResult, AlertsClientError> {
        let objects = self
            .saved_objects
            .find(self.namespace.as_ref(), RULE_SAVED_OBJECT_TYPE)?;
        let data = objects
            .into_iter()
            .map(|object| self.to_rule(object))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FindResult {
            total: data.len(),
            data,
        })
    }

    /// Replaces the editable fields. An enabled rule gets a fresh API key
    /// owned by the caller; the old key is invalidated afterwards.
    pub async fn update(&self, id: &str, data: UpdateRuleData) -> Result<Rule, AlertsClientError> {
        let object = self.load(id)?;
        let existing = attributes_of(&object)?;
        let rule_type = self.rule_types.get(&existing.alert_type_id)?;
        validate_interval(&data.schedule.interval)?;
        let actions = self.resolve_actions(&rule_type, &data.actions)?;
        let previous_key = self.unsealed_key_id(id, existing.api_key.as_deref());

        let username = self.capabilities.get_user_name().await?;
        let grant = if existing.enabled {
            self.capabilities.create_api_key().await?.into_result()
        } else {
            None
        };
        let written = self.seal_api_key(id, grant.as_ref()).and_then(|api_key| {
            let patch = json!({
                "name": data.name,
                "tags": data.tags,
                "schedule": data.schedule,
                "params": data.params,
                "actions": actions,
                "throttle": data.throttle,
                "apiKey": api_key,
                "apiKeyOwner": grant.as_ref().and(username.clone()),
                "updatedBy": username,
                "updatedAt": Utc::now(),
            });
            self.write_versioned(id, patch, object.version)
        });
        let updated = match written {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_grant(id, grant).await;
                return Err(err);
            }
        };
        debug!(parent: &self.logger, rule_id = %id, "rule updated");
        self.invalidate_quietly(id, previous_key).await;
        self.to_rule(updated)
    }

    /// Re-issues the rule's API key as the caller, whether or not it is enabled.
    pub async fn update_api_key(&self, id: &str) -> Result<(), AlertsClientError> {
        let object = self.load(id)?;
        let existing = attributes_of(&object)?;
        let previous_key = self.unsealed_key_id(id, existing.api_key.as_deref());

        let username = self.capabilities.get_user_name().await?;
        let grant = self.capabilities.create_api_key().await?.into_result();
        let written = self.seal_api_key(id, grant.as_ref()).and_then(|api_key| {
            let patch = json!({
                "apiKey": api_key,
                "apiKeyOwner": grant.as_ref().and(username.clone()),
                "updatedBy": username,
                "updatedAt": Utc::now(),
            });
            self.write_versioned(id, patch, object.version)
        });
        if let Err(err) = written {
            self.discard_grant(id, grant).await;
            return Err(err);
        }
        self.invalidate_quietly(id, previous_key).await;
        Ok(())
    }

    /// Mints a key and schedules the task before the rule is marked enabled,
    /// so a failure leaves the stored rule untouched.
    pub async fn enable(&self, id: &str) -> Result<(), AlertsClientError> {
        let object = self.load(id)?;
        let existing = attributes_of(&object)?;
        if existing.enabled {
            return Ok(());
        }
        let previous_key = self.unsealed_key_id(id, existing.api_key.as_deref());

        let username = self.capabilities.get_user_name().await?;
        let grant = self.capabilities.create_api_key().await?.into_result();
        let task_id = match self.schedule_task(id, &existing.alert_type_id) {
            Ok(task_id) => task_id,
            Err(err) => {
                warn!(
                    parent: &self.logger,
                    rule_id = %id,
                    error = %err,
                    "scheduling failed, rule left disabled"
                );
                self.discard_grant(id, grant).await;
                return Err(err);
            }
        };
        let written = self.seal_api_key(id, grant.as_ref()).and_then(|api_key| {
            let patch = json!({
                "enabled": true,
                "apiKey": api_key,
                "apiKeyOwner": grant.as_ref().and(username.clone()),
                "scheduledTaskId": task_id,
                "updatedBy": username,
                "updatedAt": Utc::now(),
            });
            self.write_versioned(id, patch, object.version)
        });
        if let Err(err) = written {
            self.remove_task_quietly(id, &task_id);
            self.discard_grant(id, grant).await;
            return Err(err);
        }
        info!(parent: &self.logger, rule_id = %id, "rule enabled");
        self.invalidate_quietly(id, previous_key).await;
        Ok(())
    }

    pub async fn disable(&self, id: &str) -> Result<(), AlertsClientError> {
        let object = self.load(id)?;
        let existing = attributes_of(&object)?;
        if !existing.enabled {
            return Ok(());
        }
        let previous_key = self.unsealed_key_id(id, existing.api_key.as_deref());

        let username = self.capabilities.get_user_name().await?;
        self.write_versioned(
            id,
            json!({
                "enabled": false,
                "apiKey": Value::Null,
                "apiKeyOwner": Value::Null,
                "scheduledTaskId": Value::Null,
                "updatedBy": username,
                "updatedAt": Utc::now(),
            }),
            object.version,
        )?;
        // The stored key is gone at this point, so it is invalidated even
        // when the task cannot be removed.
        let removed = match existing.scheduled_task_id.as_deref() {
            Some(task_id) => self.remove_task(id, task_id),
            None => Ok(()),
        };
        self.invalidate_quietly(id, previous_key).await;
        removed?;
        info!(parent: &self.logger, rule_id = %id, "rule disabled");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AlertsClientError> {
        let object = self.load(id)?;
        let existing = attributes_of(&object)?;
        let previous_key = self.unsealed_key_id(id, existing.api_key.as_deref());

        self.saved_objects
            .delete(self.namespace.as_ref(), RULE_SAVED_OBJECT_TYPE, id)?;
        let removed = match existing.scheduled_task_id.as_deref() {
            Some(task_id) => self.remove_task(id, task_id),
            None => Ok(()),
        };
        self.invalidate_quietly(id, previous_key).await;
        removed?;
        info!(parent: &self.logger, rule_id = %id, "rule deleted");
        Ok(())
    }

    fn store_new_rule(
        &self,
        id: &str,
        attributes: &mut RuleAttributes,
        grant: Option<&ApiKeyGrant>,
    ) -> Result<SavedObject, AlertsClientError> {
        attributes.api_key = self.seal_api_key(id, grant)?;
        Ok(self.saved_objects.create(
            self.namespace.as_ref(),
            RULE_SAVED_OBJECT_TYPE,
            Some(id),
            serde_json::to_value(&*attributes)?,
        )?)
    }

    fn write_versioned(
        &self,
        id: &str,
        patch: Value,
        version: u64,
    ) -> Result<SavedObject, AlertsClientError> {
        Ok(self.saved_objects.update(
            self.namespace.as_ref(),
            RULE_SAVED_OBJECT_TYPE,
            id,
            patch,
            Some(version),
        )?)
    }

    fn load(&self, id: &str) -> Result<SavedObject, AlertsClientError> {
        Ok(self
            .saved_objects
            .get(self.namespace.as_ref(), RULE_SAVED_OBJECT_TYPE, id)?)
    }

    fn to_rule(&self, object: SavedObject) -> Result<Rule, AlertsClientError> {
        let attributes = attributes_of(&object)?;
        Ok(Rule::from_attributes(object.id, object.version, attributes))
    }

    fn resolve_actions(
        &self,
        rule_type: &RuleType,
        actions: &[RuleAction],
    ) -> Result<Vec<ResolvedRuleAction>, AlertsClientError> {
        actions
            .iter()
            .map(|action| {
                if !rule_type.has_action_group(&action.group) {
                    return Err(AlertsClientError::InvalidActionGroup(action.group.clone()));
                }
                let action_type_id = self.action_type_id(&action.id)?;
                Ok(ResolvedRuleAction {
                    group: action.group.clone(),
                    id: action.id.clone(),
                    action_type_id,
                    params: action.params.clone(),
                })
            })
            .collect()
    }

    /// Preconfigured actions win over actions saved in the space.
    fn action_type_id(&self, action_id: &str) -> Result<String, AlertsClientError> {
        if let Some(action) = find_preconfigured(&self.preconfigured_actions, action_id) {
            return Ok(action.action_type_id.clone());
        }
        let object = self
            .saved_objects
            .get(self.namespace.as_ref(), ACTION_SAVED_OBJECT_TYPE, action_id)
            .map_err(|err| match err {
                StoreError::NotFound { .. } => {
                    AlertsClientError::UnknownAction(action_id.to_string())
                }
                other => other.into(),
            })?;
        object
            .attributes
            .get("actionTypeId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AlertsClientError::UnknownAction(action_id.to_string()))
    }

    fn schedule_task(
        &self,
        rule_id: &str,
        rule_type_id: &str,
    ) -> Result<String, AlertsClientError> {
        let space_id = self.space_id.as_ref().map(SpaceId::as_str);
        let task = self.task_manager.schedule(TaskInstance {
            task_type: format!("alerting:{rule_type_id}"),
            params: json!({ "alertId": rule_id, "spaceId": space_id }),
            state: json!({
                "alertInstances": {},
                "alertTypeState": {},
                "previousStartedAt": Value::Null,
            }),
            scope: vec!["alerting".to_string()],
            run_at: None,
        })?;
        Ok(task.id)
    }

    fn remove_task(&self, rule_id: &str, task_id: &str) -> Result<(), AlertsClientError> {
        match self.task_manager.remove(task_id) {
            Ok(()) => Ok(()),
            Err(TaskError::NotFound(_)) => {
                debug!(
                    parent: &self.logger,
                    rule_id = %rule_id,
                    task_id = %task_id,
                    "task already gone"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove_task_quietly(&self, rule_id: &str, task_id: &str) {
        if let Err(err) = self.remove_task(rule_id, task_id) {
            warn!(
                parent: &self.logger,
                rule_id = %rule_id,
                task_id = %task_id,
                error = %err,
                "failed to remove task"
            );
        }
    }

    fn seal_api_key(
        &self,
        rule_id: &str,
        grant: Option<&ApiKeyGrant>,
    ) -> Result<Option<String>, AlertsClientError> {
        let Some(grant) = grant else {
            return Ok(None);
        };
        let sealed = self
            .encrypted_objects
            .encrypt_attribute(rule_descriptor(rule_id), &grant.encoded())?;
        Ok(Some(sealed))
    }

    /// The id of a stored key, or `None` when absent or unreadable.
    fn unsealed_key_id(&self, rule_id: &str, sealed: Option<&str>) -> Option<String> {
        let sealed = sealed?;
        let encoded = match self
            .encrypted_objects
            .decrypt_attribute(rule_descriptor(rule_id), sealed)
        {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(
                    parent: &self.logger,
                    rule_id = %rule_id,
                    error = %err,
                    "failed to load api key to invalidate"
                );
                return None;
            }
        };
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        decoded.split_once(':').map(|(id, _)| id.to_string())
    }

    /// Revokes a key minted for a write that did not happen.
    async fn discard_grant(&self, rule_id: &str, grant: Option<ApiKeyGrant>) {
        self.invalidate_quietly(rule_id, grant.map(|grant| grant.id))
            .await;
    }

    /// Invalidation of a replaced key never fails the calling operation.
    async fn invalidate_quietly(&self, rule_id: &str, key_id: Option<String>) {
        let Some(key_id) = key_id else {
            return;
        };
        let params = InvalidateApiKeyParams { id: key_id };
        match self.capabilities.invalidate_api_key(&params).await {
            Ok(CredentialResult::Enabled(result)) if result.error_count > 0 => {
                warn!(
                    parent: &self.logger,
                    rule_id = %rule_id,
                    api_key_id = %params.id,
                    "api key invalidation reported errors"
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    parent: &self.logger,
                    rule_id = %rule_id,
                    api_key_id = %params.id,
                    error = %err,
                    "failed to invalidate api key"
                );
            }
        }
    }
}

fn rule_descriptor(id: &str) -> AttributeDescriptor<'_> {
    AttributeDescriptor {
        object_type: RULE_SAVED_OBJECT_TYPE,
        id,
    }
}

fn attributes_of(object: &SavedObject) -> Result<RuleAttributes, AlertsClientError> {
    Ok(serde_json::from_value(object.attributes.clone())?)
}

fn validate_interval(interval: &str) -> Result<(), AlertsClientError> {
    parse_interval(interval)
        .map(|_| ())
        .ok_or_else(|| AlertsClientError::InvalidInterval(interval.to_string()))
}

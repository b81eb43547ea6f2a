use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionGroup {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RuleType {
    pub id: String,
    pub name: String,
    pub action_groups: Vec<ActionGroup>,
    pub default_action_group_id: String,
    pub producer: String,
}

impl RuleType {
    pub fn has_action_group(&self, group: &str) -> bool {
        self.action_groups.iter().any(|candidate| candidate.id == group)
    }
}

#[derive(Debug, Error)]
pub enum RuleTypeError {
    #[error("rule type \"{0}\" is already registered")]
    AlreadyRegistered(String),
    #[error("rule type \"{0}\" is not registered")]
    NotRegistered(String),
    #[error("rule type \"{rule_type}\" has no action group \"{group}\"")]
    UnknownActionGroup { rule_type: String, group: String },
}

#[derive(Clone, Default)]
pub struct RuleTypeRegistry {
    types: Arc<RwLock<BTreeMap<String, RuleType>>>,
}

impl RuleTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn register(&self, rule_type: RuleType) -> Result<(), RuleTypeError> {
        let mut types = self.types.write();
        if types.contains_key(&rule_type.id) {
            return Err(RuleTypeError::AlreadyRegistered(rule_type.id));
        }
        if !rule_type.has_action_group(&rule_type.default_action_group_id) {
            return Err(RuleTypeError::UnknownActionGroup {
                rule_type: rule_type.id.clone(),
                group: rule_type.default_action_group_id.clone(),
            });
        }
        types.insert(rule_type.id.clone(), rule_type);
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.types.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<RuleType, RuleTypeError> {
        self.types
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RuleTypeError::NotRegistered(id.to_string()))
    }

    pub fn list(&self) -> Vec<RuleType> {
        self.types.read().values().cloned().collect()
    }
}

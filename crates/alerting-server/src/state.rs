use std::path::Path;
use std::sync::Arc;

use alerting::{AlertsClientFactory, FactoryOptions, InitializedFactory};
use control_plane::{
    load_from_system_config, ActionGroup, ControlPlaneBundle, RuleType, RuleTypeError,
    RuleTypeRegistry, SavedObjectsClient, SecurityAuthority, SystemConfig, SystemConfigLoader,
};
use tracing::info_span;

use crate::error::AppError;

pub struct AppState {
    pub factory: InitializedFactory,
    pub saved_objects: Arc<dyn SavedObjectsClient>,
    pub security: Option<Arc<dyn SecurityAuthority>>,
}

impl AppState {
    pub fn new(bundle: &ControlPlaneBundle, factory: InitializedFactory) -> Self {
        Self {
            factory,
            saved_objects: bundle.saved_objects.clone(),
            security: bundle.security.clone(),
        }
    }
}

/// Builds the collaborators from `config` and binds them into `factory`.
pub fn bootstrap(
    config: &SystemConfig,
    factory: &AlertsClientFactory,
) -> Result<AppState, AppError> {
    let bundle = load_from_system_config(config)?;
    register_builtin_rule_types(&bundle.rule_types)
        .map_err(|err| AppError::internal(err.to_string()))?;
    let initialized = factory.initialize(FactoryOptions::from_bundle(
        &bundle,
        info_span!("alerts_client"),
    ))?;
    Ok(AppState::new(&bundle, initialized))
}

pub fn load_config(path: &Path) -> Result<SystemConfig, AppError> {
    Ok(SystemConfigLoader::from_path(path)?)
}

pub fn create_default_config(path: &Path) -> Result<String, AppError> {
    let content = default_config_template();
    std::fs::write(path, content.as_bytes())?;
    Ok(content)
}

pub fn default_config_template() -> String {
    let lines = [
        "storage = { sled_path = \"alerting.sled\" }",
        "spaces = { default_space_id = \"default\" }",
        concat!(
            "security = { enabled = false, api_keys_enabled = true, ",
            "internal_user = \"alerting_system\", cluster_url = \"\", timeout_ms = 30000 }",
        ),
        "encryption = { key = \"\" }",
        "actions = { preconfigured_file = \"\" }",
    ];
    format!("{}\n", lines.join("\n"))
}

/// Rule types served by this binary.
pub fn register_builtin_rule_types(registry: &RuleTypeRegistry) -> Result<(), RuleTypeError> {
    registry.register(RuleType {
        id: "example.always-firing".to_string(),
        name: "Always firing".to_string(),
        action_groups: vec![ActionGroup {
            id: "default".to_string(),
            name: "Default".to_string(),
        }],
        default_action_group_id: "default".to_string(),
        producer: "alerts".to_string(),
    })
}

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bootstrap::BootstrapError;

/// An action target defined in configuration and visible to every space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreconfiguredAction {
    pub id: String,
    pub action_type_id: String,
    pub name: String,
    #[serde(default)]
    pub config: Value,
}

pub type PreconfiguredActions = Arc<[PreconfiguredAction]>;

pub fn find_preconfigured<'a>(
    actions: &'a [PreconfiguredAction],
    id: &str,
) -> Option<&'a PreconfiguredAction> {
    actions.iter().find(|action| action.id == id)
}

pub fn load_preconfigured_actions(path: &Path) -> Result<Vec<PreconfiguredAction>, BootstrapError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| BootstrapError::Io(format!("{}: {err}", path.display())))?;
    serde_json::from_str(&raw).map_err(|err| BootstrapError::Parse(err.to_string()))
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RULE_SAVED_OBJECT_TYPE: &str = "alert";
pub const ACTION_SAVED_OBJECT_TYPE: &str = "action";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    pub interval: String,
}

/// Parses `<n>s`, `<n>m`, `<n>h` or `<n>d` with `n > 0`.
pub fn parse_interval(interval: &str) -> Option<Duration> {
    let unit = interval.chars().last()?;
    let amount: i64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    if amount <= 0 {
        return None;
    }
    match unit {
        's' => Some(Duration::seconds(amount)),
        'm' => Some(Duration::minutes(amount)),
        'h' => Some(Duration::hours(amount)),
        'd' => Some(Duration::days(amount)),
        _ => None,
    }
}

/// An action as submitted by a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub group: String,
    pub id: String,
    #[serde(default)]
    pub params: Value,
}

/// An action with its connector type resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRuleAction {
    pub group: String,
    pub id: String,
    pub action_type_id: String,
    pub params: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleData {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub alert_type_id: String,
    pub consumer: String,
    pub schedule: IntervalSchedule,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub throttle: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleData {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub schedule: IntervalSchedule,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub throttle: Option<String>,
}

/// Stored form of a rule. `api_key` holds the sealed `base64(id:key)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RuleAttributes {
    pub name: String,
    pub tags: Vec<String>,
    pub alert_type_id: String,
    pub consumer: String,
    pub schedule: IntervalSchedule,
    pub params: Value,
    pub actions: Vec<ResolvedRuleAction>,
    pub enabled: bool,
    pub throttle: Option<String>,
    pub api_key: Option<String>,
    pub api_key_owner: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_task_id: Option<String>,
    #[serde(default)]
    pub mute_all: bool,
    #[serde(default)]
    pub muted_instance_ids: Vec<String>,
}

/// A rule as returned to callers; never exposes the API key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub alert_type_id: String,
    pub consumer: String,
    pub schedule: IntervalSchedule,
    pub params: Value,
    pub actions: Vec<ResolvedRuleAction>,
    pub enabled: bool,
    pub throttle: Option<String>,
    pub api_key_owner: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_task_id: Option<String>,
    pub mute_all: bool,
    pub muted_instance_ids: Vec<String>,
    pub version: u64,
}

impl Rule {
    pub(crate) fn from_attributes(id: String, version: u64, attributes: RuleAttributes) -> Self {
        Self {
            id,
            name: attributes.name,
            tags: attributes.tags,
            alert_type_id: attributes.alert_type_id,
            consumer: attributes.consumer,
            schedule: attributes.schedule,
            params: attributes.params,
            actions: attributes.actions,
            enabled: attributes.enabled,
            throttle: attributes.throttle,
            api_key_owner: attributes.api_key_owner,
            created_by: attributes.created_by,
            updated_by: attributes.updated_by,
            created_at: attributes.created_at,
            updated_at: attributes.updated_at,
            scheduled_task_id: attributes.scheduled_task_id,
            mute_all: attributes.mute_all,
            muted_instance_ids: attributes.muted_instance_ids,
            version,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindResult {
    pub total: usize,
    pub data: Vec<Rule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_parse_with_units() {
        assert_eq!(parse_interval("10s"), Some(Duration::seconds(10)));
        assert_eq!(parse_interval("5m"), Some(Duration::minutes(5)));
        assert_eq!(parse_interval("2h"), Some(Duration::hours(2)));
        assert_eq!(parse_interval("1d"), Some(Duration::days(1)));
    }

    #[test]
    fn malformed_intervals_are_rejected() {
        for interval in ["", "m", "0m", "-1m", "5", "5w", "1.5h", "five minutes"] {
            assert_eq!(parse_interval(interval), None, "{interval}");
        }
    }
}

use control_plane::{
    ActionGroup, InMemoryTaskManager, RuleType, RuleTypeError, RuleTypeRegistry, TaskInstance,
    TaskManager,
};
use serde_json::json;

fn threshold() -> RuleType {
    RuleType {
        id: "metrics.threshold".to_string(),
        name: "Metric threshold".to_string(),
        action_groups: vec![ActionGroup {
            id: "default".to_string(),
            name: "Default".to_string(),
        }],
        default_action_group_id: "default".to_string(),
        producer: "metrics".to_string(),
    }
}

#[test]
fn rule_types_register_once() {
    let registry = RuleTypeRegistry::new();
    registry.register(threshold()).expect("register");
    assert!(registry.has("metrics.threshold"));
    let err = registry.register(threshold()).expect_err("duplicate");
    assert!(matches!(err, RuleTypeError::AlreadyRegistered(id) if id == "metrics.threshold"));
    assert!(matches!(registry.get("nope"), Err(RuleTypeError::NotRegistered(_))));
    assert_eq!(registry.list().len(), 1);
}

#[test]
fn default_action_group_must_exist() {
    let mut rule_type = threshold();
    rule_type.default_action_group_id = "missing".to_string();
    let err = RuleTypeRegistry::new().register(rule_type).expect_err("invalid");
    assert!(matches!(err, RuleTypeError::UnknownActionGroup { .. }));
}

#[test]
fn task_manager_schedules_and_removes() {
    let tasks = InMemoryTaskManager::new();
    let scheduled = tasks
        .schedule(TaskInstance {
            task_type: "alerting:metrics.threshold".to_string(),
            params: json!({"alertId": "r1", "spaceId": "default"}),
            state: json!({}),
            scope: vec!["alerting".to_string()],
            run_at: None,
        })
        .expect("schedule");
    assert_eq!(tasks.get(&scheduled.id).expect("get").params["alertId"], "r1");
    tasks.remove(&scheduled.id).expect("remove");
    assert!(tasks.remove(&scheduled.id).is_err());
    assert!(tasks.list().is_empty());
}

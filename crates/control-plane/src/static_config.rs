#[derive(Clone, Debug)]
pub struct StaticConfigItem {
    pub key: &'static str,
    pub description: &'static str,
    pub value_type: &'static str,
    pub default_value: &'static str,
}

pub static STATIC_CONFIG_TABLE: &[StaticConfigItem] = &[
    StaticConfigItem {
        key: "storage.sled_path",
        description: "Saved objects database path (in-memory store when empty)",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "spaces.default_space_id",
        description: "Space served by unprefixed URLs; stored in the global namespace",
        value_type: "string",
        default_value: "default",
    },
    StaticConfigItem {
        key: "security.enabled",
        description: "Attach a security subsystem to the alerting plane",
        value_type: "boolean",
        default_value: "true",
    },
    StaticConfigItem {
        key: "security.api_keys_enabled",
        description: "Whether the cluster enforces API keys",
        value_type: "boolean",
        default_value: "true",
    },
    StaticConfigItem {
        key: "security.internal_user",
        description: "Internal identity that grants and invalidates API keys",
        value_type: "string",
        default_value: "alerting_system",
    },
    StaticConfigItem {
        key: "security.cluster_url",
        description: "Security cluster endpoint (static token table when empty)",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "security.cluster_username",
        description: "Username of the internal identity on the cluster",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "security.cluster_password",
        description: "Password of the internal identity on the cluster",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "security.timeout_ms",
        description: "Security cluster request timeout in milliseconds",
        value_type: "number",
        default_value: "30000",
    },
    StaticConfigItem {
        key: "security.users_file",
        description: "JSON token table for the static security authority",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "encryption.key",
        description: "Base64 32-byte key for encrypted attributes (ephemeral when empty)",
        value_type: "string",
        default_value: "",
    },
    StaticConfigItem {
        key: "actions.preconfigured_file",
        description: "JSON list of preconfigured actions",
        value_type: "string",
        default_value: "",
    },
];

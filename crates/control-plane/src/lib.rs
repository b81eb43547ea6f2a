pub mod actions;
pub mod audit;
pub mod bootstrap;
pub mod cluster_security;
pub mod config;
pub mod encrypted_objects;
pub mod request;
pub mod rule_types;
pub mod saved_objects;
pub mod security;
pub mod spaces;
pub mod static_config;
pub mod tasks;

pub use actions::{
    find_preconfigured, load_preconfigured_actions, PreconfiguredAction, PreconfiguredActions,
};
pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use bootstrap::{
    load_from_system_config, load_token_records, BootstrapError, ControlPlaneBundle,
};
pub use cluster_security::{ClusterSecurityAuthority, ClusterSecurityConfig};
pub use config::{ConfigError, SystemConfig, SystemConfigLoader};
pub use encrypted_objects::{AttributeDescriptor, CryptoError, EncryptedSavedObjects};
pub use request::{Authorization, InboundRequest};
pub use rule_types::{ActionGroup, RuleType, RuleTypeError, RuleTypeRegistry};
pub use saved_objects::{
    InMemorySavedObjects, SavedObject, SavedObjectsClient, SledSavedObjects, StoreError,
};
pub use security::{
    ApiKeyGrant, ApiKeyGrantRequest, AuthenticatedUser, InternalIdentity, InvalidateApiKeyParams,
    InvalidateApiKeyResult, SecurityAuthority, SecurityError, StaticSecurityAuthority, TokenRecord,
};
pub use spaces::{
    default_namespace_resolver, path_space_resolver, space_id_from_path, space_id_to_namespace,
    Namespace, NamespaceResolver, SpaceId, SpaceResolver, DEFAULT_SPACE_ID,
};
pub use tasks::{InMemoryTaskManager, ScheduledTask, TaskError, TaskInstance, TaskManager};

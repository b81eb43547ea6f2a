pub mod client;
pub mod credentials;
pub mod factory;
pub mod problem_indicator;
pub mod types;

pub use client::{AlertsClient, AlertsClientError};
pub use credentials::{
    CredentialDelegate, CredentialResult, RequestCapabilities, SecurityCapability,
};
pub use factory::{
    AlertsClientFactory, ClientConfiguration, FactoryError, FactoryOptions, InitializedFactory,
};
pub use problem_indicator::{
    problem_notices, JobNotice, JobProblemFlags, ProblemIndicator, RecreateCallback,
    RenderedNotice,
};
pub use types::{
    parse_interval, CreateRuleData, FindResult, IntervalSchedule, ResolvedRuleAction, Rule,
    RuleAction, UpdateRuleData, ACTION_SAVED_OBJECT_TYPE, RULE_SAVED_OBJECT_TYPE,
};

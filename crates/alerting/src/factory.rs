use std::sync::{Arc, OnceLock};

use control_plane::{
    AuditSink, ControlPlaneBundle, EncryptedSavedObjects, InboundRequest, InternalIdentity,
    Namespace, NamespaceResolver, PreconfiguredAction, PreconfiguredActions, RuleTypeRegistry,
    SavedObjectsClient, SecurityAuthority, SpaceId, SpaceResolver, TaskManager,
};
use thiserror::Error;
use tracing::{debug, info, Span};

use crate::client::AlertsClient;
use crate::credentials::{CredentialDelegate, RequestCapabilities, SecurityCapability};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("alerts client factory already initialized")]
    AlreadyInitialized,
    #[error("alerts client factory not initialized")]
    NotInitialized,
}

/// Long-lived collaborators bound once by [`AlertsClientFactory::initialize`].
pub struct FactoryOptions {
    pub logger: Span,
    pub task_manager: Arc<dyn TaskManager>,
    pub rule_types: Arc<RuleTypeRegistry>,
    pub security: Option<Arc<dyn SecurityAuthority>>,
    pub internal_identity: InternalIdentity,
    pub space_resolver: SpaceResolver,
    pub namespace_resolver: NamespaceResolver,
    pub encrypted_objects: Arc<EncryptedSavedObjects>,
    pub preconfigured_actions: Vec<PreconfiguredAction>,
    pub audit: Arc<dyn AuditSink>,
}

impl FactoryOptions {
    pub fn from_bundle(bundle: &ControlPlaneBundle, logger: Span) -> Self {
        Self {
            logger,
            task_manager: bundle.tasks.clone(),
            rule_types: bundle.rule_types.clone(),
            security: bundle.security.clone(),
            internal_identity: bundle.internal_identity.clone(),
            space_resolver: bundle.space_resolver(),
            namespace_resolver: bundle.namespace_resolver(),
            encrypted_objects: bundle.encrypted_objects.clone(),
            preconfigured_actions: bundle.preconfigured_actions.clone(),
            audit: bundle.audit.clone(),
        }
    }
}

struct FactoryState {
    logger: Span,
    task_manager: Arc<dyn TaskManager>,
    rule_types: Arc<RuleTypeRegistry>,
    delegate: Arc<CredentialDelegate>,
    space_resolver: SpaceResolver,
    namespace_resolver: NamespaceResolver,
    encrypted_objects: Arc<EncryptedSavedObjects>,
    preconfigured_actions: PreconfiguredActions,
}

impl From<FactoryOptions> for FactoryState {
    fn from(options: FactoryOptions) -> Self {
        let capability =
            SecurityCapability::from_optional(options.security, options.internal_identity);
        Self {
            logger: options.logger,
            task_manager: options.task_manager,
            rule_types: options.rule_types,
            delegate: Arc::new(CredentialDelegate::new(capability, options.audit)),
            space_resolver: options.space_resolver,
            namespace_resolver: options.namespace_resolver,
            encrypted_objects: options.encrypted_objects,
            preconfigured_actions: options.preconfigured_actions.into(),
        }
    }
}

/// Builds request-scoped alerts clients.
///
/// Collaborators are bound exactly once; clients can only be created through
/// the [`InitializedFactory`] handle that initialization hands out.
#[derive(Default)]
pub struct AlertsClientFactory {
    state: OnceLock<Arc<FactoryState>>,
}

impl AlertsClientFactory {
    pub const fn new() -> Self {
        Self {
            state: OnceLock::new(),
        }
    }

    /// Fails without touching the existing configuration when called twice.
    pub fn initialize(&self, options: FactoryOptions) -> Result<InitializedFactory, FactoryError> {
        self.state
            .set(Arc::new(FactoryState::from(options)))
            .map_err(|_| FactoryError::AlreadyInitialized)?;
        let factory = self.initialized()?;
        info!(
            parent: &factory.state.logger,
            security = factory.state.delegate.capability().is_enabled(),
            preconfigured_actions = factory.state.preconfigured_actions.len(),
            "alerts client factory initialized"
        );
        Ok(factory)
    }

    pub fn initialized(&self) -> Result<InitializedFactory, FactoryError> {
        self.state
            .get()
            .cloned()
            .map(|state| InitializedFactory { state })
            .ok_or(FactoryError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }
}

/// Read-only view of an initialized factory; cheap to clone and share.
#[derive(Clone)]
pub struct InitializedFactory {
    state: Arc<FactoryState>,
}

impl InitializedFactory {
    /// Resolves the space and namespace of `request` and binds the credential
    /// operations to it. Nothing is called on the security subsystem here.
    pub fn configure(
        &self,
        request: Arc<InboundRequest>,
        saved_objects: Arc<dyn SavedObjectsClient>,
    ) -> ClientConfiguration {
        let state = &self.state;
        let space_id = (state.space_resolver)(request.as_ref());
        let namespace = (state.namespace_resolver)(space_id.as_ref());
        debug!(
            parent: &state.logger,
            request_id = %request.request_id,
            space_id = ?space_id,
            namespace = ?namespace,
            "configuring alerts client"
        );
        ClientConfiguration {
            space_id,
            namespace,
            logger: state.logger.clone(),
            task_manager: state.task_manager.clone(),
            rule_types: state.rule_types.clone(),
            saved_objects,
            encrypted_objects: state.encrypted_objects.clone(),
            capabilities: RequestCapabilities::new(state.delegate.clone(), request),
            preconfigured_actions: state.preconfigured_actions.clone(),
        }
    }

    pub fn create(
        &self,
        request: Arc<InboundRequest>,
        saved_objects: Arc<dyn SavedObjectsClient>,
    ) -> AlertsClient {
        AlertsClient::new(self.configure(request, saved_objects))
    }
}

/// Everything one alerts client needs, fixed at creation.
#[derive(Clone)]
pub struct ClientConfiguration {
    pub space_id: Option<SpaceId>,
    pub namespace: Option<Namespace>,
    pub logger: Span,
    pub task_manager: Arc<dyn TaskManager>,
    pub rule_types: Arc<RuleTypeRegistry>,
    pub saved_objects: Arc<dyn SavedObjectsClient>,
    pub encrypted_objects: Arc<EncryptedSavedObjects>,
    pub capabilities: RequestCapabilities,
    pub preconfigured_actions: PreconfiguredActions,
}

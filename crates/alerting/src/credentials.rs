use std::sync::Arc;

use control_plane::{
    ApiKeyGrant, ApiKeyGrantRequest, AuditEvent, AuditOutcome, AuditSink, InboundRequest,
    InternalIdentity, InvalidateApiKeyParams, InvalidateApiKeyResult, SecurityAuthority,
    SecurityError,
};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::debug;

/// Outcome of a credential operation.
///
/// `Disabled` covers both "no security subsystem" and "the subsystem does not
/// enforce API keys". An enabled outcome always carries its result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialResult<T> {
    Disabled,
    Enabled(T),
}

impl<T> CredentialResult<T> {
    pub fn is_enabled(&self) -> bool {
        matches!(self, CredentialResult::Enabled(_))
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            CredentialResult::Enabled(result) => Some(result),
            CredentialResult::Disabled => None,
        }
    }

    pub fn into_result(self) -> Option<T> {
        match self {
            CredentialResult::Enabled(result) => Some(result),
            CredentialResult::Disabled => None,
        }
    }
}

impl<T> From<Option<T>> for CredentialResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(result) => CredentialResult::Enabled(result),
            None => CredentialResult::Disabled,
        }
    }
}

impl<T: Serialize> Serialize for CredentialResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CredentialResult::Disabled => {
                let mut state = serializer.serialize_struct("CredentialResult", 1)?;
                state.serialize_field("apiKeysEnabled", &false)?;
                state.end()
            }
            CredentialResult::Enabled(result) => {
                let mut state = serializer.serialize_struct("CredentialResult", 2)?;
                state.serialize_field("apiKeysEnabled", &true)?;
                state.serialize_field("result", result)?;
                state.end()
            }
        }
    }
}

/// Whether a security subsystem backs the credential operations.
#[derive(Clone)]
pub enum SecurityCapability {
    Disabled,
    Enabled {
        authority: Arc<dyn SecurityAuthority>,
        acting_as: InternalIdentity,
    },
}

impl SecurityCapability {
    pub fn from_optional(
        authority: Option<Arc<dyn SecurityAuthority>>,
        acting_as: InternalIdentity,
    ) -> Self {
        match authority {
            Some(authority) => SecurityCapability::Enabled {
                authority,
                acting_as,
            },
            None => SecurityCapability::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, SecurityCapability::Enabled { .. })
    }
}

/// Performs identity lookups and API-key management for requests.
///
/// Keys are granted and invalidated by the internal identity on behalf of the
/// request's principal, so end users need no key-management privileges.
/// Errors from the security subsystem are returned unchanged.
pub struct CredentialDelegate {
    capability: SecurityCapability,
    audit: Arc<dyn AuditSink>,
}

impl CredentialDelegate {
    pub fn new(capability: SecurityCapability, audit: Arc<dyn AuditSink>) -> Self {
        Self { capability, audit }
    }

    pub fn capability(&self) -> &SecurityCapability {
        &self.capability
    }

    pub async fn get_user_name(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<String>, SecurityError> {
        let SecurityCapability::Enabled { authority, .. } = &self.capability else {
            return Ok(None);
        };
        let user = authority.current_user(request).await?;
        Ok(user.map(|user| user.username))
    }

    pub async fn create_api_key(
        &self,
        request: &InboundRequest,
    ) -> Result<CredentialResult<ApiKeyGrant>, SecurityError> {
        let SecurityCapability::Enabled {
            authority,
            acting_as,
        } = &self.capability
        else {
            return Ok(CredentialResult::Disabled);
        };
        let grant = ApiKeyGrantRequest::new(acting_as, request);
        let outcome = authority.grant_api_key(&grant).await;
        self.record(request, "api_key.grant", acting_as, &outcome, |grant| {
            grant.id.clone()
        });
        Ok(outcome?.into())
    }

    pub async fn invalidate_api_key(
        &self,
        request: &InboundRequest,
        params: &InvalidateApiKeyParams,
    ) -> Result<CredentialResult<InvalidateApiKeyResult>, SecurityError> {
        let SecurityCapability::Enabled {
            authority,
            acting_as,
        } = &self.capability
        else {
            return Ok(CredentialResult::Disabled);
        };
        let outcome = authority.invalidate_api_key(acting_as, params).await;
        self.record(request, "api_key.invalidate", acting_as, &outcome, |_| {
            params.id.clone()
        });
        Ok(outcome?.into())
    }

    fn record<T>(
        &self,
        request: &InboundRequest,
        action: &str,
        acting_as: &InternalIdentity,
        outcome: &Result<Option<T>, SecurityError>,
        detail: impl FnOnce(&T) -> String,
    ) {
        let (outcome, detail) = match outcome {
            Ok(Some(result)) => (AuditOutcome::Success, detail(result)),
            Ok(None) => (AuditOutcome::Disabled, "api keys not enabled".to_string()),
            Err(err) => (AuditOutcome::Failure, err.to_string()),
        };
        debug!(
            request_id = %request.request_id,
            action,
            acting_as = %acting_as,
            outcome = ?outcome,
            "credential operation"
        );
        self.audit.record(AuditEvent {
            request_id: request.request_id.clone(),
            action: action.to_string(),
            acting_as: Some(acting_as.name().to_string()),
            outcome,
            detail,
        });
    }
}

/// The credential operations of one request, as handed to its client.
#[derive(Clone)]
pub struct RequestCapabilities {
    delegate: Arc<CredentialDelegate>,
    request: Arc<InboundRequest>,
}

impl RequestCapabilities {
    pub fn new(delegate: Arc<CredentialDelegate>, request: Arc<InboundRequest>) -> Self {
        Self { delegate, request }
    }

    pub fn request(&self) -> &Arc<InboundRequest> {
        &self.request
    }

    pub async fn get_user_name(&self) -> Result<Option<String>, SecurityError> {
        self.delegate.get_user_name(&self.request).await
    }

    pub async fn create_api_key(&self) -> Result<CredentialResult<ApiKeyGrant>, SecurityError> {
        self.delegate.create_api_key(&self.request).await
    }

    pub async fn invalidate_api_key(
        &self,
        params: &InvalidateApiKeyParams,
    ) -> Result<CredentialResult<InvalidateApiKeyResult>, SecurityError> {
        self.delegate.invalidate_api_key(&self.request, params).await
    }
}

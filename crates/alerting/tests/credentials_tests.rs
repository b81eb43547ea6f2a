use std::collections::HashMap;
use std::sync::Arc;

use alerting::{CredentialDelegate, CredentialResult, RequestCapabilities, SecurityCapability};
use async_trait::async_trait;
use control_plane::{
    ApiKeyGrant, ApiKeyGrantRequest, AuditOutcome, AuditSink, AuthenticatedUser,
    InMemoryAuditSink, InboundRequest, InternalIdentity, InvalidateApiKeyParams,
    InvalidateApiKeyResult, SecurityAuthority, SecurityError, StaticSecurityAuthority,
};
use parking_lot::Mutex;

/// Replays fixed answers and remembers who asked for grants.
struct ScriptedAuthority {
    grant: Option<ApiKeyGrant>,
    fail_with: Option<u16>,
    grants_seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedAuthority {
    fn returning(grant: Option<ApiKeyGrant>) -> Arc<Self> {
        Arc::new(Self {
            grant,
            fail_with: None,
            grants_seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            grant: None,
            fail_with: Some(status),
            grants_seen: Mutex::new(Vec::new()),
        })
    }

    fn check(&self) -> Result<(), SecurityError> {
        match self.fail_with {
            Some(status) => Err(SecurityError::Cluster {
                status,
                reason: "scripted failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecurityAuthority for ScriptedAuthority {
    async fn current_user(
        &self,
        _request: &InboundRequest,
    ) -> Result<Option<AuthenticatedUser>, SecurityError> {
        self.check()?;
        Ok(Some(AuthenticatedUser {
            username: "elastic".to_string(),
            full_name: None,
            roles: Vec::new(),
        }))
    }

    async fn grant_api_key(
        &self,
        grant: &ApiKeyGrantRequest<'_>,
    ) -> Result<Option<ApiKeyGrant>, SecurityError> {
        self.grants_seen.lock().push((
            grant.acting_as.name().to_string(),
            grant.on_behalf_of.request_id.clone(),
        ));
        self.check()?;
        Ok(self.grant.clone())
    }

    async fn invalidate_api_key(
        &self,
        _acting_as: &InternalIdentity,
        params: &InvalidateApiKeyParams,
    ) -> Result<Option<InvalidateApiKeyResult>, SecurityError> {
        self.check()?;
        Ok(self.grant.as_ref().map(|_| InvalidateApiKeyResult {
            invalidated_api_keys: vec![params.id.clone()],
            ..InvalidateApiKeyResult::default()
        }))
    }
}

fn sample_grant() -> ApiKeyGrant {
    ApiKeyGrant {
        id: "key-1".to_string(),
        name: "alerting".to_string(),
        api_key: "secret".to_string(),
    }
}

fn capabilities(
    authority: Option<Arc<dyn SecurityAuthority>>,
    audit: Arc<InMemoryAuditSink>,
) -> RequestCapabilities {
    let capability =
        SecurityCapability::from_optional(authority, InternalIdentity::new("alerting_system"));
    let delegate = Arc::new(CredentialDelegate::new(capability, audit));
    RequestCapabilities::new(
        delegate,
        InboundRequest::new("POST", "/api/alerts/alert")
            .with_header("authorization", "Bearer t-elastic")
            .shared(),
    )
}

#[tokio::test]
async fn without_security_everything_is_disabled() {
    let audit = InMemoryAuditSink::shared();
    let caps = capabilities(None, audit.clone());

    assert_eq!(caps.get_user_name().await.expect("name"), None);
    assert_eq!(caps.create_api_key().await.expect("create"), CredentialResult::Disabled);
    let params = InvalidateApiKeyParams {
        id: "anything".to_string(),
    };
    assert_eq!(
        caps.invalidate_api_key(&params).await.expect("invalidate"),
        CredentialResult::Disabled
    );
    assert!(audit.list().is_empty());
}

#[tokio::test]
async fn granted_key_is_returned_as_enabled() {
    let authority = ScriptedAuthority::returning(Some(sample_grant()));
    let audit = InMemoryAuditSink::shared();
    let caps = capabilities(Some(authority.clone() as Arc<dyn SecurityAuthority>), audit.clone());

    let created = caps.create_api_key().await.expect("create");
    assert_eq!(created, CredentialResult::Enabled(sample_grant()));

    let seen = authority.grants_seen.lock().clone();
    assert_eq!(
        seen,
        vec![(
            "alerting_system".to_string(),
            caps.request().request_id.clone()
        )]
    );

    let events = audit.list();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "api_key.grant");
    assert_eq!(events[0].outcome, AuditOutcome::Success);
    assert_eq!(events[0].detail, "key-1");
    assert_eq!(events[0].acting_as.as_deref(), Some("alerting_system"));
}

#[tokio::test]
async fn absent_grant_means_disabled() {
    let authority = ScriptedAuthority::returning(None);
    let audit = InMemoryAuditSink::shared();
    let caps = capabilities(Some(authority as Arc<dyn SecurityAuthority>), audit.clone());

    let created = caps.create_api_key().await.expect("create");
    assert_eq!(created, CredentialResult::Disabled);
    assert!(created.result().is_none());

    let invalidated = caps
        .invalidate_api_key(&InvalidateApiKeyParams {
            id: "key-1".to_string(),
        })
        .await
        .expect("invalidate");
    assert_eq!(invalidated, CredentialResult::Disabled);
    assert!(audit
        .list()
        .iter()
        .all(|event| event.outcome == AuditOutcome::Disabled));
}

#[tokio::test]
async fn security_failures_propagate_unchanged() {
    let audit = InMemoryAuditSink::shared();
    let caps = capabilities(
        Some(ScriptedAuthority::failing(503) as Arc<dyn SecurityAuthority>),
        audit.clone(),
    );

    let err = caps.create_api_key().await.expect_err("grant fails");
    assert!(matches!(err, SecurityError::Cluster { status: 503, .. }));

    let err = caps.get_user_name().await.expect_err("lookup fails");
    assert!(matches!(err, SecurityError::Cluster { status: 503, .. }));

    let events = audit.list();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, AuditOutcome::Failure);
}

#[tokio::test]
async fn static_authority_round_trip_invalidates_key() {
    let tokens = HashMap::from([(
        "t-elastic".to_string(),
        AuthenticatedUser {
            username: "elastic".to_string(),
            full_name: None,
            roles: Vec::new(),
        },
    )]);
    let authority =
        StaticSecurityAuthority::shared(tokens, InternalIdentity::new("alerting_system"), true);
    let caps = capabilities(
        Some(authority.clone() as Arc<dyn SecurityAuthority>),
        InMemoryAuditSink::shared(),
    );

    assert_eq!(
        caps.get_user_name().await.expect("name"),
        Some("elastic".to_string())
    );
    let grant = caps
        .create_api_key()
        .await
        .expect("create")
        .into_result()
        .expect("enabled");
    assert!(authority.is_active(&grant.id));

    let outcome = caps
        .invalidate_api_key(&InvalidateApiKeyParams {
            id: grant.id.clone(),
        })
        .await
        .expect("invalidate");
    let result = outcome.result().expect("enabled");
    assert_eq!(result.invalidated_api_keys, vec![grant.id.clone()]);
    assert!(!authority.is_active(&grant.id));
}

#[test]
fn credential_results_serialize_with_enabled_flag() {
    let disabled: CredentialResult<ApiKeyGrant> = CredentialResult::Disabled;
    assert_eq!(
        serde_json::to_value(&disabled).expect("json"),
        serde_json::json!({ "apiKeysEnabled": false })
    );

    let enabled = CredentialResult::Enabled(sample_grant());
    assert_eq!(
        serde_json::to_value(&enabled).expect("json"),
        serde_json::json!({
            "apiKeysEnabled": true,
            "result": { "id": "key-1", "name": "alerting", "api_key": "secret" }
        })
    );
}

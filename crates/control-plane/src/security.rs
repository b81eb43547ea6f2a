use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::request::{Authorization, InboundRequest};

pub const DEFAULT_API_KEY_NAME: &str = "alerting";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The service identity used for privileged credential operations.
///
/// Never derived from an end user: it comes from configuration and is only
/// ever used to act on behalf of the principal of a request.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct InternalIdentity(String);

impl InternalIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A grant performed by `acting_as` for the principal of `on_behalf_of`.
#[derive(Clone, Debug)]
pub struct ApiKeyGrantRequest<'a> {
    pub acting_as: &'a InternalIdentity,
    pub on_behalf_of: &'a InboundRequest,
    pub name: String,
}

impl<'a> ApiKeyGrantRequest<'a> {
    pub fn new(acting_as: &'a InternalIdentity, on_behalf_of: &'a InboundRequest) -> Self {
        Self {
            acting_as,
            on_behalf_of,
            name: DEFAULT_API_KEY_NAME.to_string(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyGrant {
    pub id: String,
    pub name: String,
    pub api_key: String,
}

impl ApiKeyGrant {
    /// `base64(id:api_key)`, the form accepted by `Authorization: ApiKey`.
    pub fn encoded(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.id, self.api_key))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InvalidateApiKeyParams {
    pub id: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct InvalidateApiKeyResult {
    pub invalidated_api_keys: Vec<String>,
    pub previously_invalidated_api_keys: Vec<String>,
    pub error_count: u32,
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),
    #[error("security cluster returned {status}: {reason}")]
    Cluster { status: u16, reason: String },
    #[error("security transport error: {0}")]
    Transport(String),
}

/// The security subsystem as seen by the alerting plane.
///
/// `Ok(None)` from the credential operations means API keys are not enforced
/// by the cluster; it is not an error.
#[async_trait]
pub trait SecurityAuthority: Send + Sync {
    async fn current_user(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<AuthenticatedUser>, SecurityError>;

    async fn grant_api_key(
        &self,
        grant: &ApiKeyGrantRequest<'_>,
    ) -> Result<Option<ApiKeyGrant>, SecurityError>;

    async fn invalidate_api_key(
        &self,
        acting_as: &InternalIdentity,
        params: &InvalidateApiKeyParams,
    ) -> Result<Option<InvalidateApiKeyResult>, SecurityError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_key: String,
    pub user: AuthenticatedUser,
}

#[derive(Clone, Debug)]
struct IssuedKey {
    owner: AuthenticatedUser,
    api_key: String,
    invalidated: bool,
}

/// In-process security authority backed by a static bearer-token table.
pub struct StaticSecurityAuthority {
    tokens: HashMap<String, AuthenticatedUser>,
    internal: InternalIdentity,
    api_keys_enabled: bool,
    issued: Mutex<HashMap<String, IssuedKey>>,
}

impl StaticSecurityAuthority {
    pub fn new(
        tokens: HashMap<String, AuthenticatedUser>,
        internal: InternalIdentity,
        api_keys_enabled: bool,
    ) -> Self {
        Self {
            tokens,
            internal,
            api_keys_enabled,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared(
        tokens: HashMap<String, AuthenticatedUser>,
        internal: InternalIdentity,
        api_keys_enabled: bool,
    ) -> Arc<Self> {
        Arc::new(Self::new(tokens, internal, api_keys_enabled))
    }

    pub fn from_records(
        records: &[TokenRecord],
        internal: InternalIdentity,
        api_keys_enabled: bool,
    ) -> Self {
        let tokens = records
            .iter()
            .map(|record| (record.token_key.clone(), record.user.clone()))
            .collect();
        Self::new(tokens, internal, api_keys_enabled)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.issued
            .lock()
            .get(id)
            .map(|key| !key.invalidated)
            .unwrap_or(false)
    }

    fn ensure_internal(&self, acting_as: &InternalIdentity) -> Result<(), SecurityError> {
        if acting_as != &self.internal {
            return Err(SecurityError::Forbidden(format!(
                "{acting_as} may not manage api keys"
            )));
        }
        Ok(())
    }

    fn user_for_api_key(&self, encoded: &str) -> Option<AuthenticatedUser> {
        let decoded = STANDARD.decode(encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;
        let issued = self.issued.lock();
        let key = issued.get(id)?;
        if key.invalidated || key.api_key != secret {
            return None;
        }
        Some(key.owner.clone())
    }
}

#[async_trait]
impl SecurityAuthority for StaticSecurityAuthority {
    async fn current_user(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<AuthenticatedUser>, SecurityError> {
        let user = match request.authorization() {
            Some(Authorization::Bearer(token)) => self.tokens.get(&token).cloned(),
            Some(Authorization::ApiKey(encoded)) => self.user_for_api_key(&encoded),
            _ => None,
        };
        Ok(user)
    }

    async fn grant_api_key(
        &self,
        grant: &ApiKeyGrantRequest<'_>,
    ) -> Result<Option<ApiKeyGrant>, SecurityError> {
        if !self.api_keys_enabled {
            return Ok(None);
        }
        self.ensure_internal(grant.acting_as)?;
        let owner = self
            .current_user(grant.on_behalf_of)
            .await?
            .ok_or_else(|| SecurityError::Unauthorized("no principal to grant for".to_string()))?;

        let id = Uuid::new_v4().simple().to_string();
        let api_key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(22)
            .map(char::from)
            .collect();
        self.issued.lock().insert(
            id.clone(),
            IssuedKey {
                owner,
                api_key: api_key.clone(),
                invalidated: false,
            },
        );
        Ok(Some(ApiKeyGrant {
            id,
            name: grant.name.clone(),
            api_key,
        }))
    }

    async fn invalidate_api_key(
        &self,
        acting_as: &InternalIdentity,
        params: &InvalidateApiKeyParams,
    ) -> Result<Option<InvalidateApiKeyResult>, SecurityError> {
        if !self.api_keys_enabled {
            return Ok(None);
        }
        self.ensure_internal(acting_as)?;
        let mut issued = self.issued.lock();
        let mut result = InvalidateApiKeyResult::default();
        match issued.get_mut(&params.id) {
            Some(key) if key.invalidated => {
                result.previously_invalidated_api_keys.push(params.id.clone());
            }
            Some(key) => {
                key.invalidated = true;
                result.invalidated_api_keys.push(params.id.clone());
            }
            None => result.error_count = 1,
        }
        Ok(Some(result))
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::request::{Authorization, InboundRequest};
use crate::security::{
    ApiKeyGrant, ApiKeyGrantRequest, AuthenticatedUser, InternalIdentity, InvalidateApiKeyParams,
    InvalidateApiKeyResult, SecurityAuthority, SecurityError,
};

#[derive(Clone, Debug)]
pub struct ClusterSecurityConfig {
    pub base_url: String,
    pub internal: InternalIdentity,
    pub username: String,
    pub password: String,
    pub timeout_ms: u64,
    pub api_keys_enabled: bool,
}

impl Default for ClusterSecurityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9200".to_string(),
            internal: InternalIdentity::new("alerting_system"),
            username: String::new(),
            password: String::new(),
            timeout_ms: 30_000,
            api_keys_enabled: true,
        }
    }
}

/// Security authority backed by a cluster's `_security` HTTP API.
#[derive(Clone)]
pub struct ClusterSecurityAuthority {
    client: Client,
    config: ClusterSecurityConfig,
}

#[derive(Deserialize)]
struct ClusterUser {
    username: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

impl ClusterSecurityAuthority {
    pub fn new(config: ClusterSecurityConfig) -> Result<Self, SecurityError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn as_internal(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.username, Some(&self.config.password))
    }

    fn ensure_internal(&self, acting_as: &InternalIdentity) -> Result<(), SecurityError> {
        if acting_as != &self.config.internal {
            return Err(SecurityError::Forbidden(format!(
                "{acting_as} may not manage api keys"
            )));
        }
        Ok(())
    }

    /// Sends a privileged request, mapping "api keys are not enabled" to `None`.
    async fn send_privileged<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, SecurityError> {
        let response = self
            .as_internal(builder)
            .send()
            .await
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        if status.is_success() {
            let parsed = serde_json::from_value(body)
                .map_err(|err| SecurityError::Transport(err.to_string()))?;
            return Ok(Some(parsed));
        }
        let reason = error_reason(&body);
        if api_keys_disabled(&body) {
            debug!(status = status.as_u16(), %reason, "api keys disabled on cluster");
            return Ok(None);
        }
        Err(SecurityError::Cluster {
            status: status.as_u16(),
            reason,
        })
    }
}

#[async_trait]
impl SecurityAuthority for ClusterSecurityAuthority {
    async fn current_user(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<AuthenticatedUser>, SecurityError> {
        let Some(authorization) = request.authorization() else {
            return Ok(None);
        };
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&authorization.header_value())
            .map_err(|err| SecurityError::Unauthorized(err.to_string()))?;
        headers.insert(AUTHORIZATION, value);

        let response = self
            .client
            .get(self.url("/_security/_authenticate"))
            .headers(headers)
            .send()
            .await
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SecurityError::Cluster {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }
        let user: ClusterUser = serde_json::from_value(body)
            .map_err(|err| SecurityError::Transport(err.to_string()))?;
        Ok(Some(AuthenticatedUser {
            username: user.username,
            full_name: user.full_name,
            roles: user.roles,
        }))
    }

    async fn grant_api_key(
        &self,
        grant: &ApiKeyGrantRequest<'_>,
    ) -> Result<Option<ApiKeyGrant>, SecurityError> {
        if !self.config.api_keys_enabled {
            return Ok(None);
        }
        self.ensure_internal(grant.acting_as)?;
        let authorization = grant
            .on_behalf_of
            .authorization()
            .ok_or_else(|| {
                SecurityError::Unauthorized("request carries no credentials".to_string())
            })?;
        let body = grant_body(&authorization, &grant.name)?;
        let builder = self
            .client
            .post(self.url("/_security/api_key/grant"))
            .json(&body);
        self.send_privileged(builder).await
    }

    async fn invalidate_api_key(
        &self,
        acting_as: &InternalIdentity,
        params: &InvalidateApiKeyParams,
    ) -> Result<Option<InvalidateApiKeyResult>, SecurityError> {
        if !self.config.api_keys_enabled {
            return Ok(None);
        }
        self.ensure_internal(acting_as)?;
        let builder = self
            .client
            .delete(self.url("/_security/api_key"))
            .json(&json!({ "ids": [params.id] }));
        self.send_privileged(builder).await
    }
}

fn grant_body(authorization: &Authorization, name: &str) -> Result<Value, SecurityError> {
    match authorization {
        Authorization::Bearer(token) => Ok(json!({
            "grant_type": "access_token",
            "access_token": token,
            "api_key": { "name": name },
        })),
        Authorization::Basic(encoded) => {
            let decoded = STANDARD
                .decode(encoded)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or_else(malformed_basic)?;
            let (username, password) = decoded.split_once(':').ok_or_else(malformed_basic)?;
            Ok(json!({
                "grant_type": "password",
                "username": username,
                "password": password,
                "api_key": { "name": name },
            }))
        }
        other => Err(SecurityError::UnsupportedScheme(other.scheme().to_string())),
    }
}

fn error_reason(body: &Value) -> String {
    body.pointer("/error/reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string()
}

fn api_keys_disabled(body: &Value) -> bool {
    let kind = body.pointer("/error/type").and_then(Value::as_str);
    kind == Some("feature_not_enabled_exception")
        || error_reason(body).contains("api keys are not enabled")
}

fn malformed_basic() -> SecurityError {
    SecurityError::Unauthorized("malformed basic credentials".to_string())
}

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

/// The parts of an inbound HTTP request the alerting plane looks at.
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn authorization(&self) -> Option<Authorization> {
        Authorization::parse(self.header("authorization")?)
    }
}

/// Credentials carried in an `Authorization` header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Authorization {
    Bearer(String),
    Basic(String),
    ApiKey(String),
    Other { scheme: String, credentials: String },
}

impl Authorization {
    pub fn parse(value: &str) -> Option<Self> {
        let (scheme, credentials) = value.trim().split_once(' ')?;
        let credentials = credentials.trim();
        if credentials.is_empty() {
            return None;
        }
        let parsed = match scheme.to_lowercase().as_str() {
            "bearer" => Authorization::Bearer(credentials.to_string()),
            "basic" => Authorization::Basic(credentials.to_string()),
            "apikey" => Authorization::ApiKey(credentials.to_string()),
            _ => Authorization::Other {
                scheme: scheme.to_string(),
                credentials: credentials.to_string(),
            },
        };
        Some(parsed)
    }

    pub fn scheme(&self) -> &str {
        match self {
            Authorization::Bearer(_) => "Bearer",
            Authorization::Basic(_) => "Basic",
            Authorization::ApiKey(_) => "ApiKey",
            Authorization::Other { scheme, .. } => scheme,
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            Authorization::Bearer(value)
            | Authorization::Basic(value)
            | Authorization::ApiKey(value) => format!("{} {}", self.scheme(), value),
            Authorization::Other { scheme, credentials } => format!("{scheme} {credentials}"),
        }
    }
}

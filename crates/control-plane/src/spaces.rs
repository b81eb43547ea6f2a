use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::request::InboundRequest;

pub const DEFAULT_SPACE_ID: &str = "default";

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub String);

impl SpaceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage partition key derived from a space.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(pub String);

impl Namespace {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SpaceResolver = Arc<dyn Fn(&InboundRequest) -> Option<SpaceId> + Send + Sync>;
pub type NamespaceResolver = Arc<dyn Fn(Option<&SpaceId>) -> Option<Namespace> + Send + Sync>;

/// Reads the space from a `/s/{space_id}/...` path prefix, falling back to
/// `default_space_id` for unprefixed paths.
pub fn space_id_from_path(path: &str, default_space_id: &str) -> SpaceId {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("s"), Some(space)) if !space.is_empty() => SpaceId::new(space),
        _ => SpaceId::new(default_space_id),
    }
}

/// The default space lives in the global namespace; every other space maps
/// to a namespace of the same name.
pub fn space_id_to_namespace(
    space_id: Option<&SpaceId>,
    default_space_id: &str,
) -> Option<Namespace> {
    match space_id {
        None => None,
        Some(space) if space.as_str() == default_space_id => None,
        Some(space) => Some(Namespace::new(space.as_str())),
    }
}

pub fn path_space_resolver(default_space_id: impl Into<String>) -> SpaceResolver {
    let default_space_id = default_space_id.into();
    Arc::new(move |request: &InboundRequest| {
        Some(space_id_from_path(&request.path, &default_space_id))
    })
}

pub fn default_namespace_resolver(default_space_id: impl Into<String>) -> NamespaceResolver {
    let default_space_id = default_space_id.into();
    Arc::new(move |space_id: Option<&SpaceId>| space_id_to_namespace(space_id, &default_space_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_path_selects_space() {
        assert_eq!(
            space_id_from_path("/s/marketing/api/alerts/_find", DEFAULT_SPACE_ID),
            SpaceId::new("marketing")
        );
        assert_eq!(
            space_id_from_path("/api/alerts/_find", DEFAULT_SPACE_ID),
            SpaceId::new(DEFAULT_SPACE_ID)
        );
        assert_eq!(space_id_from_path("/s/", DEFAULT_SPACE_ID), SpaceId::new(DEFAULT_SPACE_ID));
    }

    #[test]
    fn default_space_has_no_namespace() {
        let resolve = default_namespace_resolver(DEFAULT_SPACE_ID);
        assert_eq!(resolve(Some(&SpaceId::new(DEFAULT_SPACE_ID))), None);
        assert_eq!(resolve(None), None);
        assert_eq!(
            resolve(Some(&SpaceId::new("ops"))),
            Some(Namespace::new("ops"))
        );
    }
}

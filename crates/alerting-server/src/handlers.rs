use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use alerting::{AlertsClient, CreateRuleData, FindResult, Rule, UpdateRuleData};
use axum::async_trait;
use axum::extract::{FromRequestParts, OriginalUri, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use control_plane::{InboundRequest, RuleType};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// The inbound request as seen by the alerting plane, with the path before
/// any router nesting was stripped.
pub struct AlertsRequest(pub Arc<InboundRequest>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AlertsRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(AlertsRequest(Arc::new(inbound_request(parts))))
    }
}

fn inbound_request(parts: &Parts) -> InboundRequest {
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let mut request = InboundRequest::new(parts.method.as_str(), path);
    request.headers = convert_headers(&parts.headers);
    request
}

fn convert_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }
    map
}

fn client(state: &AppState, request: Arc<InboundRequest>) -> AlertsClient {
    state.factory.create(request, state.saved_objects.clone())
}

fn rule_id(params: &HashMap<String, String>) -> Result<&str, AppError> {
    params
        .get("id")
        .map(String::as_str)
        .ok_or_else(|| AppError::bad_request("missing rule id"))
}

/// Rejects requests without a resolvable principal when a security
/// subsystem is attached.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(security) = &state.security {
        let (parts, body) = req.into_parts();
        let inbound = inbound_request(&parts);
        let user = security
            .current_user(&inbound)
            .await?
            .ok_or_else(|| AppError::unauthorized("unable to authenticate request"))?;
        debug!(request_id = %inbound.request_id, user = %user.username, "request authenticated");
        return Ok(next.run(Request::from_parts(parts, body)).await);
    }
    Ok(next.run(req).await)
}

pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    AlertsRequest(request): AlertsRequest,
    Json(data): Json<CreateRuleData>,
) -> Result<Json<Rule>, AppError> {
    let rule = client(&state, request).create(data).await?;
    Ok(Json(rule))
}

pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<Json<Rule>, AppError> {
    let rule = client(&state, request).get(rule_id(&params)?).await?;
    Ok(Json(rule))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
    Json(data): Json<UpdateRuleData>,
) -> Result<Json<Rule>, AppError> {
    let rule = client(&state, request)
        .update(rule_id(&params)?, data)
        .await?;
    Ok(Json(rule))
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<StatusCode, AppError> {
    client(&state, request).delete(rule_id(&params)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn enable_rule(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<StatusCode, AppError> {
    client(&state, request).enable(rule_id(&params)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disable_rule(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<StatusCode, AppError> {
    client(&state, request).disable(rule_id(&params)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_rule_api_key(
    State(state): State<Arc<AppState>>,
    Path(params): Path<HashMap<String, String>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<StatusCode, AppError> {
    client(&state, request)
        .update_api_key(rule_id(&params)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn find_rules(
    State(state): State<Arc<AppState>>,
    AlertsRequest(request): AlertsRequest,
) -> Result<Json<FindResult>, AppError> {
    let found = client(&state, request).find().await?;
    Ok(Json(found))
}

pub async fn list_rule_types(
    State(state): State<Arc<AppState>>,
    AlertsRequest(request): AlertsRequest,
) -> Json<Vec<RuleType>> {
    Json(client(&state, request).list_rule_types())
}

#[cfg(test)]
mod tests {
    use super::*;

    use alerting::{AlertsClientFactory, FactoryOptions, IntervalSchedule};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use control_plane::{
        AuthenticatedUser, ControlPlaneBundle, InternalIdentity, SecurityAuthority,
        StaticSecurityAuthority,
    };
    use serde_json::json;
    use tower::ServiceExt;
    use tracing::Span;

    use crate::routes::router;
    use crate::state::register_builtin_rule_types;

    fn build_state(with_security: bool) -> Arc<AppState> {
        let mut bundle = ControlPlaneBundle::in_memory();
        if with_security {
            let tokens = HashMap::from([(
                "t-elastic".to_string(),
                AuthenticatedUser {
                    username: "elastic".to_string(),
                    full_name: None,
                    roles: Vec::new(),
                },
            )]);
            let authority: Arc<dyn SecurityAuthority> = StaticSecurityAuthority::shared(
                tokens,
                InternalIdentity::new("alerting_system"),
                true,
            );
            bundle.security = Some(authority);
        }
        register_builtin_rule_types(&bundle.rule_types).expect("rule types");
        let factory = AlertsClientFactory::new()
            .initialize(FactoryOptions::from_bundle(&bundle, Span::none()))
            .expect("initialize");
        Arc::new(AppState::new(&bundle, factory))
    }

    fn request(path: &str) -> Arc<InboundRequest> {
        InboundRequest::new("POST", path)
            .with_header("authorization", "Bearer t-elastic")
            .shared()
    }

    fn rule_data() -> CreateRuleData {
        CreateRuleData {
            name: "always".to_string(),
            tags: Vec::new(),
            alert_type_id: "example.always-firing".to_string(),
            consumer: "alerts".to_string(),
            schedule: IntervalSchedule {
                interval: "1m".to_string(),
            },
            params: json!({}),
            actions: Vec::new(),
            enabled: true,
            throttle: None,
        }
    }

    fn id_param(id: &str) -> Path<HashMap<String, String>> {
        Path(HashMap::from([("id".to_string(), id.to_string())]))
    }

    #[tokio::test]
    async fn rule_lifecycle_through_handlers() {
        let state = build_state(true);
        let Json(created) = create_rule(
            State(state.clone()),
            AlertsRequest(request("/s/marketing/api/alerts/alert")),
            Json(rule_data()),
        )
        .await
        .expect("create rule");
        assert_eq!(created.api_key_owner.as_deref(), Some("elastic"));

        let Json(fetched) = get_rule(
            State(state.clone()),
            id_param(&created.id),
            AlertsRequest(request("/s/marketing/api/alerts/alert")),
        )
        .await
        .expect("get rule");
        assert_eq!(fetched.id, created.id);

        let missing = get_rule(
            State(state.clone()),
            id_param(&created.id),
            AlertsRequest(request("/api/alerts/alert")),
        )
        .await
        .expect_err("other space");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let status = disable_rule(
            State(state.clone()),
            id_param(&created.id),
            AlertsRequest(request("/s/marketing/api/alerts/alert")),
        )
        .await
        .expect("disable rule");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(found) = find_rules(
            State(state.clone()),
            AlertsRequest(request("/s/marketing/api/alerts/_find")),
        )
        .await
        .expect("find rules");
        assert_eq!(found.total, 1);
        assert!(!found.data[0].enabled);

        delete_rule(
            State(state.clone()),
            id_param(&created.id),
            AlertsRequest(request("/s/marketing/api/alerts/alert")),
        )
        .await
        .expect("delete rule");
        let Json(found) = find_rules(
            State(state),
            AlertsRequest(request("/s/marketing/api/alerts/_find")),
        )
        .await
        .expect("find rules");
        assert_eq!(found.total, 0);
    }

    #[tokio::test]
    async fn invalid_rule_is_a_bad_request() {
        let state = build_state(false);
        let mut data = rule_data();
        data.schedule.interval = "whenever".to_string();
        let err = create_rule(
            State(state),
            AlertsRequest(request("/api/alerts/alert")),
            Json(data),
        )
        .await
        .expect_err("bad interval");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn router_requires_a_known_user() {
        let app = router(build_state(true));
        let anonymous = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/alerts/list_alert_types")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("response");
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let known = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/s/marketing/api/alerts/list_alert_types")
                    .header("authorization", "Bearer t-elastic")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("response");
        assert_eq!(known.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn router_resolves_space_from_prefixed_path() {
        let state = build_state(false);
        let app = router(state.clone());
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/s/marketing/api/alerts/alert")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&rule_data()).expect("encode"),
                    ))
                    .expect("request build"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let Json(marketing) = find_rules(
            State(state.clone()),
            AlertsRequest(request("/s/marketing/api/alerts/_find")),
        )
        .await
        .expect("find");
        assert_eq!(marketing.total, 1);
        let Json(default) = find_rules(State(state), AlertsRequest(request("/api/alerts/_find")))
            .await
            .expect("find");
        assert_eq!(default.total, 0);
    }
}

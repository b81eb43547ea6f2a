use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

use control_plane::{
    ApiKeyGrantRequest, ClusterSecurityAuthority, ClusterSecurityConfig, InboundRequest,
    InternalIdentity, InvalidateApiKeyParams, SecurityAuthority, SecurityError,
};

/// Answers a single request and hands back what it received.
fn spawn_server(status: u16, body: &'static str) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = tx.send(read_request(&mut stream));
            let response = format!(
                "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://{}", addr), rx)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let read = stream.read(&mut buf).unwrap_or(0);
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..read]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

fn authority(base_url: String) -> ClusterSecurityAuthority {
    ClusterSecurityAuthority::new(ClusterSecurityConfig {
        base_url,
        internal: InternalIdentity::new("alerting_system"),
        username: "alerting_system".to_string(),
        password: "changeme".to_string(),
        timeout_ms: 2_000,
        api_keys_enabled: true,
    })
    .expect("authority")
}

#[tokio::test]
async fn authenticate_forwards_user_credentials() {
    let (url, seen) = spawn_server(200, r#"{"username":"elastic","roles":["superuser"]}"#);
    let request =
        InboundRequest::new("GET", "/api/alerts/_find").with_header("authorization", "Bearer abc");
    let user = authority(url)
        .current_user(&request)
        .await
        .expect("user")
        .expect("present");
    assert_eq!(user.username, "elastic");
    let raw = seen.recv().expect("request").to_lowercase();
    assert!(raw.starts_with("get /_security/_authenticate"));
    assert!(raw.contains("authorization: bearer abc"));
}

#[tokio::test]
async fn authenticate_maps_401_to_none() {
    let (url, _seen) =
        spawn_server(401, r#"{"error":{"type":"security_exception","reason":"bad"}}"#);
    let request = InboundRequest::new("GET", "/").with_header("authorization", "Bearer abc");
    assert!(authority(url).current_user(&request).await.expect("lookup").is_none());
}

#[tokio::test]
async fn grant_uses_access_token_as_internal_user() {
    let (url, seen) = spawn_server(200, r#"{"id":"k1","name":"alerting","api_key":"secret"}"#);
    let internal = InternalIdentity::new("alerting_system");
    let request =
        InboundRequest::new("POST", "/").with_header("authorization", "Bearer user-token");
    let grant = authority(url)
        .grant_api_key(&ApiKeyGrantRequest::new(&internal, &request))
        .await
        .expect("grant")
        .expect("enabled");
    assert_eq!(grant.id, "k1");
    let raw = seen.recv().expect("request");
    assert!(raw.starts_with("POST /_security/api_key/grant"));
    assert!(raw.contains("\"grant_type\":\"access_token\""));
    assert!(raw.contains("\"access_token\":\"user-token\""));
    assert!(!raw.to_lowercase().contains("authorization: bearer user-token"));
}

#[tokio::test]
async fn grant_maps_disabled_feature_to_none() {
    let (url, _seen) = spawn_server(
        400,
        r#"{"error":{"type":"feature_not_enabled_exception","reason":"api keys are not enabled"}}"#,
    );
    let internal = InternalIdentity::new("alerting_system");
    let request = InboundRequest::new("POST", "/").with_header("authorization", "Bearer t");
    let grant = authority(url)
        .grant_api_key(&ApiKeyGrantRequest::new(&internal, &request))
        .await
        .expect("grant");
    assert!(grant.is_none());
}

#[tokio::test]
async fn grant_rejects_api_key_scheme() {
    let authority = authority("http://127.0.0.1:9".to_string());
    let internal = InternalIdentity::new("alerting_system");
    let request = InboundRequest::new("POST", "/").with_header("authorization", "ApiKey abc");
    let err = authority
        .grant_api_key(&ApiKeyGrantRequest::new(&internal, &request))
        .await
        .expect_err("unsupported");
    assert!(matches!(err, SecurityError::UnsupportedScheme(scheme) if scheme == "ApiKey"));
}

#[tokio::test]
async fn invalidate_propagates_cluster_errors() {
    let (url, _seen) = spawn_server(500, r#"{"error":{"type":"exception","reason":"boom"}}"#);
    let internal = InternalIdentity::new("alerting_system");
    let err = authority(url)
        .invalidate_api_key(&internal, &InvalidateApiKeyParams { id: "k1".to_string() })
        .await
        .expect_err("cluster error");
    match err {
        SecurityError::Cluster { status, reason } => {
            assert_eq!(status, 500);
            assert_eq!(reason, "boom");
        }
        other => panic!("unexpected error {other}"),
    }
}

//! Common utilities for the Apstra API client
//!
//! Provides the HTTP transport shared by every resource module plus the
//! small wire types most endpoints have in common.

pub mod query;

use crate::backoff::FibonacciBackoff;
use crate::config::ClientConfig;
use crate::error::ApstraError;
use crate::retry::with_retry;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Header carrying the session token
pub const AUTH_HEADER: &str = "AuthToken";

const LOGIN_PATH: &str = "/api/aaa/login";
const LOGOUT_PATH: &str = "/api/aaa/logout";

/// Body keys whose values are masked in request logs
const REDACTED_KEYS: &[&str] = &["password", "token"];

/// Identifier of any controller object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Body returned by most create calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: ObjectId,
}

/// List wrapper used by collection endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// HTTP client wrapper with token authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
    max_retries: u32,
    retry_min_delay: Duration,
    retry_max_delay: Duration,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper from a validated config
    pub fn new(config: &ClientConfig) -> Result<Self, ApstraError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.tls_insecure)
            .build()
            .map_err(ApstraError::Http)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: RwLock::new(None),
            max_retries: config.max_retries,
            retry_min_delay: config.retry_min_delay,
            retry_max_delay: config.retry_max_delay,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Maximum number of attempts for retryable failures
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fresh backoff sequence using the configured bounds
    pub fn backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(self.retry_min_delay, self.retry_max_delay)
    }

    /// Build a full URL from a path and query pairs
    pub fn build_url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };

        let query_string = build_query_string(query);
        if !query_string.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query_string);
        }
        url
    }

    /// Whether a session token is currently held
    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Authenticate and store the session token
    pub async fn login(&self) -> Result<(), ApstraError> {
        let url = self.build_url(LOGIN_PATH, &[]);
        info!("Logging in to {} as {}", self.base_url, self.username);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(ApstraError::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(ApstraError::Http)?;
        if !status.is_success() {
            return Err(match ApstraError::from_response(status.as_u16(), &body) {
                ApstraError::Api { message, .. } | ApstraError::NotFound(message) => {
                    ApstraError::Authentication(message)
                }
                other => other,
            });
        }

        let login: LoginResponse = serde_json::from_str(&body)?;
        *self.token.write().await = Some(login.token);
        debug!("Login succeeded");
        Ok(())
    }

    /// End the session and forget the token
    pub async fn logout(&self) -> Result<(), ApstraError> {
        if !self.has_token().await {
            return Ok(());
        }
        let result = self
            .talk::<(), serde_json::Value>(Method::POST, LOGOUT_PATH, &[], None)
            .await;
        *self.token.write().await = None;
        result.map(|_| ())
    }

    /// Send one request and return the status and body text.
    ///
    /// A 401 on an authenticated session triggers one re-login and replay.
    async fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, String), ApstraError> {
        let mut relogged = false;

        loop {
            let token = self.token.read().await.clone();

            let mut request = self
                .client
                .request(method.clone(), url)
                .header("Accept", "application/json");
            if let Some(token) = &token {
                request = request.header(AUTH_HEADER, token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await.map_err(ApstraError::Http)?;
            let status = response.status();
            let text = response.text().await.map_err(ApstraError::Http)?;

            if status == StatusCode::UNAUTHORIZED && token.is_some() && !relogged {
                info!("Session token rejected, logging in again");
                self.login().await?;
                relogged = true;
                continue;
            }

            return Ok((status, text));
        }
    }

    /// Generic request helper used by every resource module.
    ///
    /// Serializes `body`, sends it with the session token, maps non-success
    /// statuses onto [`ApstraError`] and decodes the response into `T`. An
    /// empty response body decodes as JSON `null`, so `()`, `Option<_>` and
    /// `serde_json::Value` all work for endpoints without content.
    /// Rate-limited requests (429) are retried with backoff.
    pub async fn talk<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApstraError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(path, query);
        let body = body.map(serde_json::to_value).transpose()?;

        match &body {
            Some(b) => debug!("{} {} with body: {}", method, url, redacted(b)),
            None => debug!("{} {}", method, url),
        }

        let (method_ref, url_ref, body_ref) = (&method, url.as_str(), body.as_ref());
        let (status, text) = with_retry(
            self.backoff(),
            self.max_retries,
            |e| matches!(e, ApstraError::TooManyRequests(_)),
            move || async move {
                let (status, text) = self.send(method_ref, url_ref, body_ref).await?;
                if status.is_success() {
                    Ok((status, text))
                } else {
                    Err(ApstraError::from_response(status.as_u16(), &text))
                }
            },
        )
        .await
        .map_err(|e| match e {
            ApstraError::NotFound(message) => {
                ApstraError::NotFound(format!("{} {}: {}", method, path, message))
            }
            other => other,
        })?;

        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(payload).map_err(|e| ApstraError::Api {
            status: status.as_u16(),
            message: format!(
                "error decoding response body of {} {}: {} - Response (first 500 chars): {}",
                method,
                path,
                e,
                text.chars().take(500).collect::<String>()
            ),
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApstraError> {
        self.talk::<(), T>(Method::GET, path, &[], None).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApstraError> {
        self.talk::<(), T>(Method::GET, path, query, None).await
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApstraError> {
        self.talk(Method::POST, path, &[], Some(body)).await
    }

    /// Make a PUT request, discarding any response body
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApstraError> {
        let _: serde_json::Value = self.talk(Method::PUT, path, &[], Some(body)).await?;
        Ok(())
    }

    /// Make a PATCH request, discarding any response body
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApstraError> {
        let _: serde_json::Value = self.talk(Method::PATCH, path, &[], Some(body)).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), ApstraError> {
        let _: serde_json::Value = self.talk::<(), _>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}

/// Copy of `value` with every secret-bearing key masked, at any depth
fn redacted(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if REDACTED_KEYS.contains(&k.as_str()) {
                        Value::String("<redacted>".to_string())
                    } else {
                        redacted(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redacted).collect()),
        other => other.clone(),
    }
}

/// Build query string from filters
pub fn build_query_string(filters: &[(&str, &str)]) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Log sink shared between a test and its subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config_for(server: &MockServer) -> ClientConfig {
        let mut config = ClientConfig::new(server.uri(), "admin", "secret").unwrap();
        config.retry_min_delay = Duration::from_millis(1);
        config.retry_max_delay = Duration::from_millis(2);
        config.max_retries = 3;
        config
    }

    async fn mount_login(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(json!({"username": "admin", "password": "secret"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": token, "id": "u1"})))
            .mount(server)
            .await;
    }

    #[test]
    fn test_build_query_string_encodes() {
        assert_eq!(build_query_string(&[]), "");
        assert_eq!(
            build_query_string(&[("type", "staging"), ("label", "a b&c")]),
            "type=staging&label=a%20b%26c"
        );
    }

    #[tokio::test]
    async fn test_build_url() {
        let server = MockServer::start().await;
        let http = HttpClient::new(&config_for(&server)).unwrap();

        assert_eq!(
            http.build_url("/api/blueprints", &[("type", "staging")]),
            format!("{}/api/blueprints?type=staging", server.uri())
        );
        assert_eq!(http.build_url("/api/version", &[]), format!("{}/api/version", server.uri()));
    }

    #[tokio::test]
    async fn test_login_sets_token_header() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1").await;
        Mock::given(method("GET"))
            .and(path("/api/design/tags"))
            .and(header(AUTH_HEADER, "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        http.login().await.unwrap();
        assert!(http.has_token().await);

        let list: ListResponse<serde_json::Value> = http.get("/api/design/tags").await.unwrap();
        assert!(list.items.is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"errors": "Invalid credentials"})))
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        let err = http.login().await.unwrap_err();
        assert!(matches!(err, ApstraError::Authentication(ref m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_expired_token_triggers_relogin() {
        let server = MockServer::start().await;
        mount_login(&server, "fresh").await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .and(header(AUTH_HEADER, "stale"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .and(header(AUTH_HEADER, "fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "4.2.1"})))
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        *http.token.write().await = Some("stale".to_string());

        let version: serde_json::Value = http.get("/api/version").await.unwrap();
        assert_eq!(version["version"], "4.2.1");
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "bp"}]})))
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        let list: ListResponse<IdResponse> = http.get("/api/blueprints").await.unwrap();
        assert_eq!(list.items[0].id, ObjectId::from("bp"));
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried_by_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/design/tags"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"errors": "Tag with label 'x' already exists"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        let err = http
            .post::<_, IdResponse>("/api/design/tags", &json!({"label": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::Exists(_)));
    }

    #[tokio::test]
    async fn test_empty_body_and_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/design/tags/t1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/bp/nodes"))
            .and(query_param("node_type", "system"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": {}})))
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        http.delete("/api/design/tags/t1").await.unwrap();
        let nodes: serde_json::Value = http
            .get_with_query("/api/blueprints/bp/nodes", &[("node_type", "system")])
            .await
            .unwrap();
        assert!(nodes["nodes"].is_object());
    }

    #[tokio::test]
    async fn test_not_found_mentions_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/design/tags/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": "No such tag"})))
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        let err = http.get::<serde_json::Value>("/api/design/tags/missing").await.unwrap_err();
        match err {
            ApstraError::NotFound(message) => {
                assert!(message.contains("/api/design/tags/missing"));
                assert!(message.contains("No such tag"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_redacted_masks_nested_secrets() {
        let body = json!({
            "gw_name": "dc2",
            "password": "s3cret",
            "nested": [{"token": "abc", "keep": 1}]
        });
        let masked = redacted(&body);
        assert_eq!(masked["gw_name"], "dc2");
        assert_eq!(masked["password"], "<redacted>");
        assert_eq!(masked["nested"][0]["token"], "<redacted>");
        assert_eq!(masked["nested"][0]["keep"], 1);
    }

    #[tokio::test]
    async fn test_request_body_log_hides_password() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/bp1/remote_gateways"))
            .and(body_json(json!({"gw_name": "dc2", "password": "s3cret"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "gw1"})))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        let created: IdResponse = http
            .post(
                "/api/blueprints/bp1/remote_gateways",
                &json!({"gw_name": "dc2", "password": "s3cret"}),
            )
            .await
            .unwrap();
        assert_eq!(created.id.as_str(), "gw1");

        let output = logs.contents();
        assert!(output.contains("/api/blueprints/bp1/remote_gateways with body"), "{}", output);
        assert!(output.contains("<redacted>"));
        assert!(!output.contains("s3cret"));
    }

    #[tokio::test]
    async fn test_logout_clears_token() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1").await;
        Mock::given(method("POST"))
            .and(path(LOGOUT_PATH))
            .and(header(AUTH_HEADER, "tok-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        http.login().await.unwrap();
        http.logout().await.unwrap();
        assert!(!http.has_token().await);

        // A second logout has no session to end and sends nothing
        http.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_put_and_patch_send_json_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/design/tags/t1"))
            .and(body_json(json!({"label": "prod", "description": "production"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/blueprints/bp1/nodes/n1"))
            .and(body_json(json!({"label": "leaf-renamed"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::new(&config_for(&server)).unwrap();
        http.put("/api/design/tags/t1", &json!({"label": "prod", "description": "production"}))
            .await
            .unwrap();
        http.patch("/api/blueprints/bp1/nodes/n1", &json!({"label": "leaf-renamed"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_truncated_body_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Read the whole login request (headers plus JSON body) before answering
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    if text[head_end..].contains('}') {
                        break;
                    }
                }
            }
            socket
                .write_all(b"HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"token\": \"tr")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let config = ClientConfig::new(format!("http://{}", addr), "admin", "secret").unwrap();
        let http = HttpClient::new(&config).unwrap();
        let err = http.login().await.unwrap_err();
        assert!(matches!(err, ApstraError::Http(_)), "{:?}", err);
        assert!(!http.has_token().await);
    }
}

//! Client for the master's control API.
//!
//! Every call is one awaited round trip bounded by the configured timeout.
//! Failures are returned to the caller, who decides whether to retry with
//! [`Error::is_retryable`](crate::Error::is_retryable).

use std::sync::Arc;

use drover_core::Host;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ControlConfig;
use crate::credentials::{Credentials, load_credentials};
use crate::error::{Error, Result};
use crate::status::parse_status_lines;

/// HTTP method for [`ControlClient::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMethod {
    Get,
    Post,
    #[default]
    Put,
    Delete,
}

impl From<RequestMethod> for Method {
    fn from(method: RequestMethod) -> Self {
        match method {
            RequestMethod::Get => Self::GET,
            RequestMethod::Post => Self::POST,
            RequestMethod::Put => Self::PUT,
            RequestMethod::Delete => Self::DELETE,
        }
    }
}

/// What a [`ControlClient::bulk_control`] call did.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    /// Nodes sent to the master.
    pub accepted: usize,
    /// Lines that failed to parse and were left out.
    pub rejected: Vec<Error>,
    /// Whether a request was made at all.
    pub sent: bool,
}

/// Client for the master.
#[derive(Debug, Clone)]
pub struct ControlClient {
    config: Arc<ControlConfig>,
    /// Base URL with a trailing slash, so relative paths join beneath it.
    base_url: Url,
    http_client: reqwest::Client,
}

impl ControlClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no master URL is configured and
    /// [`Error::ConnectionFailed`] if the HTTP client cannot be built.
    pub fn with_config(config: ControlConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .map(with_trailing_slash)
            .ok_or_else(|| Error::config("No master URL configured"))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::connection_failed(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http_client,
        })
    }

    /// Create a client for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// See [`ControlClient::with_config`].
    pub fn with_url(base_url: Url) -> Result<Self> {
        Self::with_config(ControlConfig::with_master(base_url))
    }

    /// The master base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Read the local credential file.
    ///
    /// The file is read on every call and nothing is cached. Returns
    /// `Ok(None)` when no file is configured or it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] for a malformed credential file.
    pub fn authenticate(&self) -> Result<Option<Credentials>> {
        match &self.config.credentials_path {
            Some(path) => load_credentials(path),
            None => Ok(None),
        }
    }

    /// GET `<base>/<path>` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// - [`Error::Auth`] on 401 or 403.
    /// - [`Error::Upstream`] on any other non-2xx status.
    /// - [`Error::Timeout`] or [`Error::ConnectionFailed`] if the request
    ///   does not complete.
    /// - [`Error::Json`] if the body is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(path, None, RequestMethod::Get, true).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send an authenticated request to `<base>/<path>`.
    ///
    /// With `check_status` false the response is returned whatever its
    /// status, for callers that treat some non-2xx answers as outcomes.
    ///
    /// # Errors
    ///
    /// Transport failures always surface. With `check_status` true, a 401 or
    /// 403 is [`Error::Auth`] and any other non-2xx is [`Error::Upstream`].
    pub async fn request(
        &self,
        path: &str,
        payload: Option<&Value>,
        method: RequestMethod,
        check_status: bool,
    ) -> Result<Response> {
        let url = self.endpoint(path)?;
        debug!(method = ?method, url = %url, "Sending control request");

        let mut builder = self.http_client.request(method.into(), url);
        if let Some(Credentials { username, password }) = self.authenticate()? {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = payload {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        if check_status {
            check_response(response).await
        } else {
            Ok(response)
        }
    }

    /// Fan one command out to every node named in `lines`.
    ///
    /// Lines are parsed with the status line grammar. Malformed lines are
    /// reported in the outcome and left out of the request. The rest are
    /// POSTed to `command` as `{"node_json": "[[package, app, host, pid], ...]"}`.
    /// Nothing is sent when no line parses.
    ///
    /// # Errors
    ///
    /// Same as [`ControlClient::request`] with `check_status` set.
    pub async fn bulk_control<I, S>(&self, lines: I, command: &str) -> Result<BulkOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let batch = parse_status_lines(lines);
        for rejected in &batch.rejected {
            warn!(error = %rejected, "Skipping status line");
        }

        if batch.nodes.is_empty() {
            info!(command, rejected = batch.rejected.len(), "No valid status lines, nothing sent");
            return Ok(BulkOutcome {
                accepted: 0,
                rejected: batch.rejected,
                sent: false,
            });
        }

        let node_json = serde_json::to_string(&batch.nodes)?;
        let payload = json!({ "node_json": node_json });
        self.request(command, Some(&payload), RequestMethod::Post, true)
            .await?;

        info!(
            command,
            accepted = batch.nodes.len(),
            rejected = batch.rejected.len(),
            "Bulk command sent"
        );
        Ok(BulkOutcome {
            accepted: batch.nodes.len(),
            rejected: batch.rejected,
            sent: true,
        })
    }

    /// PUT this host's status lines to `status/<host>`.
    ///
    /// # Errors
    ///
    /// Same as [`ControlClient::request`] with `check_status` set.
    pub async fn report_status(&self, host: &Host, lines: &[String]) -> Result<()> {
        let payload = json!({ "host": host.as_str(), "lines": lines });
        self.request(
            &format!("status/{host}"),
            Some(&payload),
            RequestMethod::default(),
            true,
        )
        .await?;
        debug!(host = %host, lines = lines.len(), "Status reported");
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
            Error::timeout(timeout_ms)
        } else if error.is_connect() {
            Error::connection_failed(error.to_string())
        } else {
            Error::Http(error)
        }
    }
}

async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::auth(format!("master rejected request with {status}")));
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::upstream(status.as_u16(), body))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn anonymous_client(server: &MockServer) -> std::result::Result<ControlClient, Box<dyn std::error::Error>> {
        let config = ControlConfig::with_master(server.uri().parse()?).anonymous();
        Ok(ControlClient::with_config(config)?)
    }

    #[test]
    fn test_request_method_default_is_put() {
        assert_eq!(RequestMethod::default(), RequestMethod::Put);
        assert_eq!(Method::from(RequestMethod::default()), Method::PUT);
    }

    #[test]
    fn test_missing_master_url() {
        let result = ControlClient::with_config(ControlConfig::default());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() -> TestResult {
        let client = ControlClient::with_url("http://master:9000/api".parse()?)?;
        assert_eq!(client.base_url().as_str(), "http://master:9000/api/");
        assert_eq!(
            client.endpoint("/status/n1")?.as_str(),
            "http://master:9000/api/status/n1"
        );
        Ok(())
    }

    #[test]
    fn test_authenticate_without_credentials_path() -> TestResult {
        let client = ControlClient::with_config(
            ControlConfig::with_master("http://master:9000/".parse()?).anonymous(),
        )?;
        assert!(client.authenticate()?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_json_success() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 3})))
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let value: Value = client.get_json("nodes").await?;
        assert_eq!(value.get("count"), Some(&json!(3)));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_json_unauthorized_is_auth_error() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let result = client.get_json::<Value>("nodes").await;
        assert!(matches!(result, Err(Error::Auth { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_json_server_error_is_retryable() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let result = client.get_json::<Value>("nodes").await;
        assert!(matches!(result, Err(Error::Upstream { status: 500, .. })));
        assert!(result.err().is_some_and(|e| e.is_retryable()));
        Ok(())
    }

    #[tokio::test]
    async fn test_request_without_status_check_returns_raw_response() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/nodes/n1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let response = client
            .request("nodes/n1", None, RequestMethod::default(), false)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_request_sends_basic_auth() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/nodes"))
            .and(header("authorization", "Basic b3BzOnNlY3JldA=="))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "username = \"ops\"\npassword = \"secret\"")?;
        let config = ControlConfig::with_master(server.uri().parse()?).credentials(file.path());
        let client = ControlClient::with_config(config)?;

        client
            .request("nodes", None, RequestMethod::Put, true)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_request_timeout() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let config = ControlConfig::with_master(server.uri().parse()?)
            .anonymous()
            .timeout(Duration::from_millis(100));
        let client = ControlClient::with_config(config)?;

        let result = client.get_json::<Value>("slow").await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_control_sends_node_json_envelope() -> TestResult {
        let server = MockServer::start().await;
        let node_json = r#"[["shop","web","n1",10],["shop","cron","n2",11]]"#;
        Mock::given(method("POST"))
            .and(path("/restart"))
            .and(body_json(json!({ "node_json": node_json })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let outcome = client
            .bulk_control(
                [
                    "shop.web (n1:10) slot 1 up 5m",
                    "not a status line",
                    "shop.cron (n2:11) slot 1 up 1h",
                ],
                "restart",
            )
            .await?;

        assert!(outcome.sent);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_bulk_control_without_valid_lines_sends_nothing() -> TestResult {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        let outcome = client.bulk_control(["garbage"], "restart").await?;

        assert!(!outcome.sent);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rejected.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_report_status() -> TestResult {
        let server = MockServer::start().await;
        let lines = vec!["shop.web (n1:10) slot 1 up 5m".to_string()];
        Mock::given(method("PUT"))
            .and(path("/status/n1"))
            .and(body_json(json!({ "host": "n1", "lines": lines })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = anonymous_client(&server)?;
        client.report_status(&Host::new("n1"), &lines).await?;
        Ok(())
    }
}

//! HTTP remote cache client
//!
//! Action results live at `{address}/ac/{hash}`, or at
//! `{address}/{instance}/ac/{hash}` for non-empty instance names. Bodies are
//! JSON-encoded `ActionResult` messages, so this is a JSON variant of the
//! HTTP cache layout: caches storing protobuf bytes under `/ac/` cannot be
//! read through it. ureq is blocking, so requests run on tokio's blocking
//! thread pool.

use super::{ActionCacheClient, ClientFactory};
use crate::config::schema::ClientConfiguration;
use crate::digest::Digest;
use crate::error::{ActionCacheError, ActionCacheResult};
use crate::messages::{self, ActionResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default request timeout when the configuration does not specify one
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates [`HttpActionCacheClient`]s.
///
/// Responses are bounded by `maximum_message_size_bytes`.
pub struct HttpClientFactory {
    maximum_message_size_bytes: usize,
}

impl HttpClientFactory {
    pub fn new(maximum_message_size_bytes: usize) -> Self {
        Self {
            maximum_message_size_bytes,
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn new_client_from_configuration(
        &self,
        configuration: &ClientConfiguration,
    ) -> ActionCacheResult<Arc<dyn ActionCacheClient>> {
        let client = HttpActionCacheClient::new(configuration, self.maximum_message_size_bytes)?;
        debug!("Created HTTP Action Cache client for {}", client.address);
        Ok(Arc::new(client))
    }
}

#[derive(Clone)]
pub struct HttpActionCacheClient {
    agent: ureq::Agent,
    address: String,
    headers: Vec<(String, String)>,
    maximum_message_size_bytes: usize,
}

impl HttpActionCacheClient {
    pub fn new(
        configuration: &ClientConfiguration,
        maximum_message_size_bytes: usize,
    ) -> ActionCacheResult<Self> {
        let address = configuration.address.trim_end_matches('/').to_string();
        if !(address.starts_with("http://") || address.starts_with("https://")) {
            return Err(ActionCacheError::InvalidArgument(format!(
                "Invalid remote cache address {:?}: must start with http:// or https://",
                configuration.address
            )));
        }

        let timeout = match &configuration.timeout {
            Some(timeout) => timeout
                .to_std()
                .map_err(|reason| {
                    ActionCacheError::InvalidArgument(format!("Invalid timeout: {}", reason))
                })?,
            None => DEFAULT_TIMEOUT,
        };
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let headers: Vec<_> = configuration
            .add_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            agent,
            address,
            headers,
            maximum_message_size_bytes,
        })
    }

    /// URL at which the action result for a digest is stored
    pub fn url(&self, digest: &Digest) -> String {
        if digest.instance_name().is_empty() {
            format!("{}/ac/{}", self.address, digest.hash())
        } else {
            format!(
                "{}/{}/ac/{}",
                self.address,
                digest.instance_name(),
                digest.hash()
            )
        }
    }

    fn get_blocking(&self, url: &str) -> ActionCacheResult<Vec<u8>> {
        let mut request = self.agent.get(url);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let mut response = request.call().map_err(|e| transport_error(url, e))?;
        match response.status().as_u16() {
            200 => response
                .body_mut()
                .with_config()
                .limit(self.maximum_message_size_bytes as u64)
                .read_to_vec()
                .map_err(|e| transport_error(url, e)),
            404 => Err(ActionCacheError::NotFound(format!(
                "Action result not found at {}",
                url
            ))),
            status => Err(status_error(url, status)),
        }
    }

    fn put_blocking(&self, url: &str, data: &[u8]) -> ActionCacheResult<()> {
        let mut request = self
            .agent
            .put(url)
            .header("Content-Type", "application/json");
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request.send(data).map_err(|e| transport_error(url, e))?;
        match response.status().as_u16() {
            200..=299 => Ok(()),
            status => Err(status_error(url, status)),
        }
    }
}

#[async_trait]
impl ActionCacheClient for HttpActionCacheClient {
    async fn get_action_result(&self, digest: &Digest) -> ActionCacheResult<ActionResult> {
        let url = self.url(digest);
        // Agents share their connection pool between clones
        let client = self.clone();
        let data = tokio::task::spawn_blocking(move || client.get_blocking(&url))
            .await
            .map_err(|e| ActionCacheError::Internal(format!("HTTP request panicked: {}", e)))??;
        messages::decode(&data, self.maximum_message_size_bytes)
    }

    async fn update_action_result(
        &self,
        digest: &Digest,
        action_result: &ActionResult,
    ) -> ActionCacheResult<()> {
        let url = self.url(digest);
        let data = messages::encode(action_result, self.maximum_message_size_bytes)?;
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.put_blocking(&url, &data))
            .await
            .map_err(|e| ActionCacheError::Internal(format!("HTTP request panicked: {}", e)))?
    }

    fn target(&self) -> &str {
        &self.address
    }
}

fn transport_error(url: &str, error: ureq::Error) -> ActionCacheError {
    match error {
        ureq::Error::BodyExceedsLimit(limit) => ActionCacheError::InvalidArgument(format!(
            "Response from {} exceeds the maximum message size of {} bytes",
            url, limit
        )),
        e => ActionCacheError::Unavailable(format!("Request to {} failed: {}", url, e)),
    }
}

fn status_error(url: &str, status: u16) -> ActionCacheError {
    let message = format!("Request to {} failed with HTTP status {}", url, status);
    match status {
        400 => ActionCacheError::InvalidArgument(message),
        401 | 403 => ActionCacheError::PermissionDenied(message),
        501 => ActionCacheError::Unimplemented(message),
        502..=504 => ActionCacheError::Unavailable(message),
        _ => ActionCacheError::Internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Accept one request, answer it with an empty 200 and return its text
    fn serve_once(listener: TcpListener) -> std::thread::JoinHandle<String> {
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                } else if n == 0 {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8_lossy(&request).to_string()
        })
    }

    fn configuration(address: &str) -> ClientConfiguration {
        ClientConfiguration {
            address: address.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_urls_with_and_without_instance() {
        let client = HttpActionCacheClient::new(&configuration("http://cache:8080/"), 1024).unwrap();
        let hash = "8b1a9953c4611296a827abf8c47804d7";
        assert_eq!(
            client.url(&Digest::new("", hash, 5).unwrap()),
            format!("http://cache:8080/ac/{}", hash)
        );
        assert_eq!(
            client.url(&Digest::new("ci/linux", hash, 5).unwrap()),
            format!("http://cache:8080/ci/linux/ac/{}", hash)
        );
        assert_eq!(client.target(), "http://cache:8080");
    }

    #[test]
    fn rejects_non_http_addresses() {
        for address in ["", "grpc://cache:8980", "cache:8080"] {
            let err = HttpClientFactory::new(1024)
                .new_client_from_configuration(&configuration(address))
                .err()
                .unwrap();
            assert_eq!(err.code(), Code::InvalidArgument, "{}", address);
        }
    }

    #[test]
    fn maps_http_statuses() {
        assert_eq!(status_error("u", 403).code(), Code::PermissionDenied);
        assert_eq!(status_error("u", 503).code(), Code::Unavailable);
        assert_eq!(status_error("u", 500).code(), Code::Internal);
    }

    #[tokio::test]
    async fn uploads_json_encoded_action_results() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let server = serve_once(listener);

        let mut config = configuration(&address);
        config
            .add_headers
            .insert("Authorization".to_string(), "Bearer token".to_string());
        let client = HttpActionCacheClient::new(&config, 1024).unwrap();
        let digest = Digest::new("ci", "8b1a9953c4611296a827abf8c47804d7", 5).unwrap();
        let action_result = ActionResult {
            exit_code: 3,
            ..Default::default()
        };
        client
            .update_action_result(&digest, &action_result)
            .await
            .unwrap();

        let request = server.join().unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("PUT /ci/ac/8b1a9953c4611296a827abf8c47804d7 "), "{}", head);
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(head.contains("Bearer token"));
        let uploaded: ActionResult = serde_json::from_str(body).unwrap();
        assert_eq!(uploaded, action_result);
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let client = HttpActionCacheClient::new(&configuration("http://127.0.0.1:9"), 1024).unwrap();
        let digest = Digest::new("", "8b1a9953c4611296a827abf8c47804d7", 5).unwrap();
        let err = client.get_action_result(&digest).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
    }
}

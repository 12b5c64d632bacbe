use super::{ApiError, Method, Transport};
use reqwest::blocking::Client;
use reqwest::header::COOKIE;
use std::time::Duration;
use tracing::debug;

/// Blocking HTTP transport against the lesson-planning server.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
    session_cookie: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        csrf_token: Option<String>,
        session_cookie: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: crate::config::normalize_base_url(base_url),
            csrf_token,
            session_cookie,
        })
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = method.as_str(), url = %url, "server request");

        let mut req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = &self.csrf_token {
            req = req.header("X-CSRFToken", token);
        }
        if let Some(cookie) = &self.session_cookie {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

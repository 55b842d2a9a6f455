use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

const DEV_TOKEN_HEADER: &str = "ClearBlade-DevToken";
const SYSTEM_KEY_HEADER: &str = "ClearBlade-SystemKey";
const SYSTEM_SECRET_HEADER: &str = "ClearBlade-SystemSecret";
const MAX_DETAIL: usize = 300;

/// Blocking JSON client for the platform API. Every non-success response is
/// turned into a classified [`Error`] here and nowhere else.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    system_key: String,
    system_secret: String,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        system_key: &str,
        system_secret: &str,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            base_url: normalize_url(base_url),
            token: None,
            system_key: system_key.to_string(),
            system_secret: system_secret.to_string(),
            max_retries,
        })
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn system_key(&self) -> &str {
        &self.system_key
    }

    /// GETs are retried on transport errors; nothing else is.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            let result = self
                .send(self.client.get(self.url(path)))
                .and_then(|resp| self.handle_response(resp));
            match result {
                Err(err) if err.is_transport() && attempt < self.max_retries => {
                    attempt += 1;
                    debug!(path, attempt, error = %err, "retrying read");
                    thread::sleep(Duration::from_millis(250 * u64::from(attempt)));
                }
                other => return other,
            }
        }
    }

    pub fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self.send(self.client.post(self.url(path)).json(body))?;
        self.handle_response(resp)
    }

    pub fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self.send(self.client.put(self.url(path)).json(body))?;
        self.handle_response(resp)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let resp = self.send(self.client.delete(self.url(path)))?;
        self.handle_response::<Value>(resp).map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut request = request;
        if let Some(token) = &self.token {
            request = request.header(DEV_TOKEN_HEADER, token);
        }
        if !self.system_key.is_empty() {
            request = request
                .header(SYSTEM_KEY_HEADER, &self.system_key)
                .header(SYSTEM_SECRET_HEADER, &self.system_secret);
        }
        Ok(request.send()?)
    }

    fn handle_response<T: DeserializeOwned>(&self, resp: Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(classify(status, &body));
        }
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| Error::Protocol(format!("{e}: {}", truncate(body))))
    }
}

/// Maps a failed response onto the error kinds the engine acts on.
pub fn classify(status: StatusCode, body: &str) -> Error {
    let detail = error_detail(body);
    let lower = detail.to_lowercase();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthFailure(detail),
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::CONFLICT => Error::Conflict(detail),
        _ if lower.contains("does not exist") || lower.contains("not found") => Error::NotFound(detail),
        _ if lower.contains("already exists") => Error::Conflict(detail),
        _ if lower.contains("invalid token") || lower.contains("token expired") => Error::AuthFailure(detail),
        _ if status.is_server_error() => Error::Transport(format!("{status}: {detail}")),
        _ => Error::Protocol(format!("{status}: {detail}")),
    }
}

/// The most specific message a platform error body carries.
fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        let err = v.get("error").unwrap_or(v);
        match err {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => ["message", "detail", "error"]
                .iter()
                .find_map(|k| err.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    });
    from_json.unwrap_or_else(|| match body.trim() {
        "" => "no details provided".to_string(),
        text => truncate(text),
    })
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_DETAIL {
        let cut: String = text.chars().take(MAX_DETAIL).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
        format!("http://{url}")
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        assert!(classify(StatusCode::UNAUTHORIZED, "").is_auth_failure());
        assert!(classify(StatusCode::FORBIDDEN, "{}").is_auth_failure());
        assert!(classify(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(matches!(classify(StatusCode::CONFLICT, ""), Error::Conflict(_)));
        assert!(classify(StatusCode::BAD_GATEWAY, "upstream").is_transport());
    }

    #[test]
    fn test_classify_by_message() {
        let err = classify(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": {"message": "Service 'A' Does Not Exist"}}"#,
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Service 'A'"));

        let err = classify(StatusCode::BAD_REQUEST, r#"{"error": "collection already exists"}"#);
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_classify_unknown_is_protocol() {
        let err = classify(StatusCode::BAD_REQUEST, "bad field");
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("bad field")));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("platform.example.com/"), "https://platform.example.com");
        assert_eq!(normalize_url("localhost:9000"), "http://localhost:9000");
        assert_eq!(normalize_url("http://10.0.0.1"), "http://10.0.0.1");
    }
}

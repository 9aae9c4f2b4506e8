use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OpendError, Result};

/// HTTP client wrapper shared by the remote service clients.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| OpendError::Validation(format!("header {name}: {e}")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json::<T>().await.map_err(OpendError::Request)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.send_json(path, &[], body).await?;
        resp.json::<T>().await.map_err(OpendError::Request)
    }

    /// POST a JSON body, ignoring the response body.
    pub async fn post_json_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        extra_headers: &[(&'static str, &str)],
        body: &B,
    ) -> Result<()> {
        self.send_json(path, extra_headers, body).await?;
        Ok(())
    }

    /// POST a multipart form and decode a JSON response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let resp = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json::<T>().await.map_err(OpendError::Request)
    }

    /// DELETE with query filters.
    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(path))
            .headers(self.headers.clone())
            .query(query)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        extra_headers: &[(&'static str, &str)],
        body: &B,
    ) -> Result<Response> {
        let mut request = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .json(body);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        let resp = request.send().await?;
        check_status(resp).await
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(OpendError::Http {
        status,
        message: error_message(&body),
    })
}

/// Pull `error` / `message` out of a JSON error body, else return it raw.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = HttpClient::new("http://localhost:3000/");
        assert_eq!(client.url("/api/x"), "http://localhost:3000/api/x");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error":"no such user"}"#), "no such user");
        assert_eq!(error_message(r#"{"message":"denied"}"#), "denied");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_bad_header_rejected() {
        assert!(HttpClient::new("http://x").with_header("apikey", "bad\nvalue").is_err());
    }
}

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::Config;
use crate::constants::graph;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::strip_sensitive_keys;

/// Thin client for the Graph API. One instance is shared by every tool
/// handler; it owns the connection pool and appends the access token at
/// send time so credentials never travel through diagnostic payloads.
pub struct GraphClient {
    http: reqwest::Client,
    config: Arc<Config>,
    logger: Logger,
    base: String,
}

impl GraphClient {
    pub fn new(config: Arc<Config>, logger: Logger) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ToolError::internal(format!("http client init failed: {}", err)))?;
        Ok(Self {
            http,
            config,
            logger,
            base: format!("{}/{}", graph::BASE_URL, graph::API_VERSION),
        })
    }

    /// Client pointed at a local stand-in for the remote API.
    #[cfg(test)]
    pub(crate) fn with_base_url(
        config: Arc<Config>,
        logger: Logger,
        base: String,
    ) -> Result<Self, ToolError> {
        let mut client = Self::new(config, logger)?;
        client.base = base;
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// GET with the standard call timeout. `path` is relative to the
    /// versioned API root.
    pub async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, ToolError> {
        let url = self.endpoint(path);
        self.logger.debug(
            "graph GET",
            Some(&json!({"path": path, "params": param_keys(params)})),
        );
        let mut query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push(("access_token", self.config.access_token()));
        let response = self
            .http
            .get(&url)
            .query(&query)
            .timeout(Duration::from_millis(graph::TIMEOUT_CALL_MS))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(&url, response).await
    }

    /// Follows an opaque paging URL returned by a prior response. The URL
    /// already carries its own cursor and credential parameters.
    pub async fn get_url(&self, url: &str) -> Result<Value, ToolError> {
        self.logger.debug("graph GET paging url", None);
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_millis(graph::TIMEOUT_CALL_MS))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        // Paging URLs embed the token as a query parameter, so the raw URL
        // never goes into error details.
        self.read_response("<paging url>", response).await
    }

    /// POST with a form-encoded body. A 200 response whose body carries an
    /// `error` member is still a failure and surfaces the stripped payload
    /// for debugging.
    pub async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, ToolError> {
        let url = self.endpoint(path);
        self.logger.debug(
            "graph POST",
            Some(&json!({"path": path, "params": param_keys(params)})),
        );
        let mut form: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        form.push(("access_token", self.config.access_token()));
        let response = self
            .http
            .post(&url)
            .form(&form)
            .timeout(Duration::from_millis(graph::TIMEOUT_CALL_MS))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = self.read_response(&url, response).await?;
        if let Some(api_error) = body.get("error") {
            return Err(ToolError::remote("Graph API rejected the request").with_details(json!({
                "error": api_error.clone(),
                "payload_sent": strip_sensitive_keys(params),
                "url": url,
                "status_code": status.as_u16(),
            })));
        }
        Ok(body)
    }

    /// Uploads image bytes to the account's adimages edge. Uses the longer
    /// image timeout.
    pub async fn upload_image(
        &self,
        act_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        name: Option<&str>,
    ) -> Result<Value, ToolError> {
        let url = self.endpoint(&format!("{}/adimages", act_id));
        self.logger.debug(
            "graph upload image",
            Some(&json!({"act_id": act_id, "filename": filename, "bytes": bytes.len()})),
        );
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let mut form = Form::new()
            .text("access_token", self.config.access_token().to_string())
            .part("source", part);
        if let Some(name) = name {
            form = form.text("name", name.to_string());
        }
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_millis(graph::TIMEOUT_IMAGE_UPLOAD_MS))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(&url, response).await
    }

    /// Uploads video bytes to the account's advideos edge. Video encoding on
    /// the remote side is slow, so this uses the longest timeout.
    pub async fn upload_video(
        &self,
        act_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        name: Option<&str>,
    ) -> Result<Value, ToolError> {
        let url = self.endpoint(&format!("{}/advideos", act_id));
        self.logger.debug(
            "graph upload video",
            Some(&json!({"act_id": act_id, "filename": filename, "bytes": bytes.len()})),
        );
        let file_size = bytes.len();
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let mut form = Form::new()
            .text("access_token", self.config.access_token().to_string())
            .text("file_size", file_size.to_string())
            .part("source", part);
        if let Some(name) = name {
            form = form.text("name", name.to_string());
        }
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_millis(graph::TIMEOUT_VIDEO_UPLOAD_MS))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        self.read_response(&url, response).await
    }

    async fn read_response(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Value, ToolError> {
        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        let body: Option<Value> = serde_json::from_str(&text).ok();
        if !status.is_success() {
            return Err(remote_failure(url, status, body, &text));
        }
        body.ok_or_else(|| {
            ToolError::remote("Graph API returned a non-JSON body")
                .with_details(json!({"url": url, "status_code": status.as_u16()}))
        })
    }
}

fn param_keys(params: &[(String, String)]) -> Value {
    Value::Array(
        params
            .iter()
            .map(|(k, _)| Value::String(k.clone()))
            .collect(),
    )
}

fn remote_failure(url: &str, status: StatusCode, body: Option<Value>, text: &str) -> ToolError {
    let mut details = json!({
        "url": url,
        "status_code": status.as_u16(),
    });
    match body {
        Some(parsed) => {
            let error = parsed.get("error").cloned().unwrap_or(parsed);
            details["error"] = error;
        }
        None => {
            // Cap the snippet without splitting a multibyte character.
            let mut end = text.len().min(512);
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            details["body"] = Value::String(text[..end].to_string());
        }
    }
    let kind = if status == StatusCode::NOT_FOUND {
        ToolError::not_found(format!("Graph API object not found ({})", status.as_u16()))
    } else {
        ToolError::remote(format!("Graph API request failed ({})", status.as_u16()))
    };
    kind.with_details(details)
}

pub fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        ToolError::timeout("Graph API request timed out")
    } else if err.is_connect() {
        ToolError::transport(format!("Graph API connection failed: {}", err))
    } else {
        ToolError::transport(format!("Graph API transport error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn endpoint_joins_version_and_trims_leading_slash() {
        let client = GraphClient::new(Arc::new(test_config()), Logger::new("test")).unwrap();
        assert_eq!(
            client.endpoint("/act_1/campaigns"),
            format!("{}/{}/act_1/campaigns", graph::BASE_URL, graph::API_VERSION)
        );
    }

    #[test]
    fn remote_failure_snippets_multibyte_bodies_without_splitting() {
        let text = "€".repeat(300);
        let err = remote_failure(
            "https://example.test/x",
            StatusCode::BAD_GATEWAY,
            None,
            &text,
        );
        let details = err.details.expect("details present");
        let body = details["body"].as_str().expect("body snippet");
        assert!(body.len() <= 512);
        assert!(body.chars().all(|c| c == '€'));
    }

    #[test]
    fn remote_failure_keeps_api_error_payload() {
        let body = serde_json::json!({"error": {"message": "bad", "code": 100}});
        let err = remote_failure(
            "https://example.test/x",
            StatusCode::BAD_REQUEST,
            Some(body),
            "",
        );
        let details = err.details.expect("details present");
        assert_eq!(details["status_code"], 400);
        assert_eq!(details["error"]["code"], 100);
    }
}

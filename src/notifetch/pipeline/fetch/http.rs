use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::RETRY_AFTER;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::notifetch::pipeline::config::ApiConfig;
use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::fetch::{
    Endpoint, PageRequest, RawPage, RemoteService, SourceId, SourceKind,
};
use crate::notifetch::pipeline::secrets::BearerToken;

/// Blocking client for the remote service's REST API.
pub struct NotionHttp {
    client: Client,
    base_url: String,
    version: String,
    token: BearerToken,
}

impl NotionHttp {
    pub fn new(config: &ApiConfig, token: BearerToken) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.notion_version.clone(),
            token,
        })
    }

    /// Verifies the credential by asking who it belongs to. Returns the bot
    /// or user name reported by the service.
    pub fn check_connection(&self) -> Result<String> {
        let body = self.send(self.client.get(self.url("users/me")))?;
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed integration")
            .to_string();
        info!(%name, "connection verified");
        Ok(name)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(self.token.expose())
            .header("Notion-Version", &self.version)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, retry_after, error_message(&body)));
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|error| ToolError::Decode(error.to_string()))
    }
}

impl RemoteService for NotionHttp {
    fn identify(&self, id: &SourceId) -> Result<SourceKind> {
        let database = self.send(self.client.get(self.url(&format!("databases/{id}"))));
        let database_error = match database {
            Ok(_) => return Ok(SourceKind::Database),
            Err(error @ (ToolError::Authentication(_) | ToolError::TransientNetwork(_))) => {
                return Err(error);
            }
            Err(error @ ToolError::RateLimited { .. }) => return Err(error),
            Err(error) => error,
        };
        debug!(%id, error = %database_error, "not a database; probing page endpoint");

        match self.send(self.client.get(self.url(&format!("pages/{id}")))) {
            Ok(_) => Ok(SourceKind::Page),
            Err(ToolError::NotFound(_)) if matches!(database_error, ToolError::Permission(_)) => {
                Err(database_error)
            }
            Err(error) => Err(error),
        }
    }

    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<RawPage> {
        let builder = match request.endpoint {
            Endpoint::DatabaseQuery => {
                let mut body = json!({ "page_size": request.page_size });
                if let Some(cursor) = request.cursor {
                    body["start_cursor"] = Value::String(cursor.to_string());
                }
                self.client
                    .post(self.url(&format!("databases/{}/query", request.id)))
                    .json(&body)
            }
            Endpoint::BlockChildren => {
                let mut query = vec![("page_size", request.page_size.to_string())];
                if let Some(cursor) = request.cursor {
                    query.push(("start_cursor", cursor.to_string()));
                }
                self.client
                    .get(self.url(&format!("blocks/{}/children", request.id)))
                    .query(&query)
            }
        };

        let body = self.send(builder)?;
        serde_json::from_value(body).map_err(|error| ToolError::Decode(error.to_string()))
    }
}

/// Maps a failed HTTP status onto the error taxonomy.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> ToolError {
    match status {
        StatusCode::UNAUTHORIZED => ToolError::Authentication(message),
        StatusCode::FORBIDDEN => ToolError::Permission(message),
        StatusCode::NOT_FOUND => ToolError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => ToolError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT => ToolError::TransientNetwork(message),
        status if status.is_server_error() => ToolError::TransientNetwork(message),
        status => ToolError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pulls the human-readable message out of an error body, falling back to
/// the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_error_taxonomy() {
        let message = || "boom".to_string();
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, message()),
            ToolError::Authentication(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, None, message()),
            ToolError::Permission(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, message()),
            ToolError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, message()),
            ToolError::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, message()),
            ToolError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn rate_limits_keep_the_requested_delay() {
        let error = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(3)),
            String::new(),
        );
        assert_eq!(error.rate_limit_delay(), Some(Some(Duration::from_secs(3))));
    }

    #[test]
    fn error_message_prefers_the_json_message_field() {
        assert_eq!(
            error_message(r#"{"object":"error","message":"Could not find database"}"#),
            "Could not find database"
        );
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}

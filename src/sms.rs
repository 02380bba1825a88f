use crate::config::TwilioConfig;
use crate::error::AppError;
use crate::twilio_types::{CreateMessageForm, MessageResource, TwilioErrorResponse};

use reqwest::StatusCode;
use tracing::{error, info, warn};

pub const MAX_BODY_CHARS: usize = 1_600;

/// E.164: a plus sign, then 8 to 15 digits, no leading zero.
pub fn validate_recipient(to: &str) -> Result<&str, AppError> {
    let to = to.trim();
    let digits = to
        .strip_prefix('+')
        .filter(|d| (8..=15).contains(&d.len()))
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .filter(|d| !d.starts_with('0'));
    match digits {
        Some(_) => Ok(to),
        None => Err(AppError::bad_request(
            "Recipient must be an E.164 phone number such as +15551234567",
        )),
    }
}

pub fn validate_body(body: &str) -> Result<&str, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("Message body is required"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(AppError::bad_request(format!(
            "Message body must be at most {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(body)
}

#[derive(Clone)]
pub struct SmsClient {
    http_client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

impl SmsClient {
    pub fn new(http_client: reqwest::Client, config: &TwilioConfig) -> Self {
        Self {
            http_client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Send one text message and return its Twilio message SID.
    pub async fn send(&self, to: &str, body: &str) -> Result<String, AppError> {
        let to = validate_recipient(to)?;
        let body = validate_body(body)?;
        let form = serde_urlencoded::to_string(CreateMessageForm {
            to,
            from: &self.from_number,
            body,
        })
        .map_err(|e| AppError::Internal(format!("failed to encode SMS form: {e}")))?;
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let resp = self
            .http_client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to send request to Twilio");
                AppError::from(e)
            })?;

        let status = resp.status();
        if status.is_success() {
            let message = resp.json::<MessageResource>().await.map_err(|e| {
                error!(error = %e, "failed to deserialize Twilio message resource");
                AppError::UpstreamDataInvalid
            })?;
            info!(sid = %message.sid, status = ?message.status, "queued SMS");
            return Ok(message.sid);
        }

        let detail = resp.json::<TwilioErrorResponse>().await.ok();
        warn!(
            status = %status,
            code = ?detail.as_ref().and_then(|d| d.code),
            message = ?detail.as_ref().and_then(|d| d.message.as_deref()),
            more_info = ?detail.as_ref().and_then(|d| d.more_info.as_deref()),
            "Twilio rejected the message"
        );
        Err(match status {
            StatusCode::BAD_REQUEST => {
                AppError::bad_request("The SMS provider rejected the message")
            }
            s => AppError::from_upstream_status(s).unwrap_or(AppError::UpstreamUnavailable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::stub_server;
    use axum::{extract::Path, http::HeaderMap, routing::post, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn config(api_base: &str) -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15005550006".to_string(),
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn recipient_validation() {
        assert_eq!(validate_recipient(" +15551234567 ").unwrap(), "+15551234567");
        assert!(validate_recipient("15551234567").is_err());
        assert!(validate_recipient("+1555").is_err());
        assert!(validate_recipient("+0123456789").is_err());
        assert!(validate_recipient("+1555123456a").is_err());
        assert!(validate_recipient("+1234567890123456").is_err());
    }

    #[test]
    fn body_validation() {
        assert!(validate_body("  ").is_err());
        assert!(validate_body(&"x".repeat(MAX_BODY_CHARS + 1)).is_err());
        assert_eq!(validate_body(" hi ").unwrap(), "hi");
    }

    #[tokio::test]
    async fn sends_form_with_basic_auth() {
        let stub = Router::new().route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(|Path(sid): Path<String>, headers: HeaderMap, body: String| async move {
                let form: HashMap<String, String> = serde_urlencoded::from_str(&body).unwrap();
                // "AC123:token" in base64
                let authorized =
                    headers["authorization"] == "Basic QUMxMjM6dG9rZW4=" && sid == "AC123";
                if authorized && form["To"] == "+15551234567" && form["From"] == "+15005550006" {
                    (
                        axum::http::StatusCode::CREATED,
                        Json(json!({ "sid": "SM42", "status": "queued" })),
                    )
                } else {
                    (
                        axum::http::StatusCode::UNAUTHORIZED,
                        Json(json!({ "code": 20003, "message": "Authenticate" })),
                    )
                }
            }),
        );
        let base = stub_server(stub).await;
        let client = SmsClient::new(reqwest::Client::new(), &config(&base));
        assert_eq!(client.send("+15551234567", "hello").await.unwrap(), "SM42");
    }

    #[tokio::test]
    async fn maps_twilio_failures() {
        let stub = Router::new().route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(|Path(sid): Path<String>| async move {
                let status = match sid.as_str() {
                    "denied" => axum::http::StatusCode::FORBIDDEN,
                    "busy" => axum::http::StatusCode::TOO_MANY_REQUESTS,
                    "bad" => axum::http::StatusCode::BAD_REQUEST,
                    _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(json!({ "code": 1, "message": "nope" })))
            }),
        );
        let base = stub_server(stub).await;
        let send = |sid: &str| {
            let mut conf = config(&base);
            conf.account_sid = sid.to_string();
            let client = SmsClient::new(reqwest::Client::new(), &conf);
            async move { client.send("+15551234567", "hello").await }
        };
        assert!(matches!(send("denied").await, Err(AppError::PermissionDenied)));
        assert!(matches!(send("busy").await, Err(AppError::RateLimited)));
        assert!(matches!(send("bad").await, Err(AppError::BadRequest(_))));
        assert!(matches!(send("down").await, Err(AppError::UpstreamUnavailable)));
    }
}

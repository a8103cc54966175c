pub mod auth;
pub mod storage;

pub use auth::AuthClient;
pub use storage::StorageClient;

use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::{BackendError, Result};

/// Passes successful responses through and maps failures onto the backend error taxonomy.
async fn check_response(response: Response, entity: &'static str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound {
            entity,
            id: message,
        },
        StatusCode::CONFLICT => BackendError::Conflict { entity },
        StatusCode::UNPROCESSABLE_ENTITY if message.contains("already") => {
            BackendError::Conflict { entity }
        }
        _ => BackendError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

/// Pulls the human-readable part out of an error body, whichever field the service used.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| json.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_fields() {
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#), "User already registered");
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(r#"{"statusCode":"409","message":"The resource already exists"}"#), "The resource already exists");
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }
}

use chrono::Utc;
use reqwest::{Client, Request};
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use uuid::Uuid;

use super::check_response;
use crate::backend::BlobStore;
use crate::constants::FALLBACK_CONTENT_TYPE;
use crate::error::Result;
use crate::session::Session;

/// Client for one bucket of the platform's object storage.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl StorageClient {
    pub fn new(api_url: &str, api_key: String, bucket: String) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/storage/v1/object", api_url.trim_end_matches('/')),
            api_key,
            bucket,
        }
    }

    pub fn public_url(&self, object_name: &str) -> String {
        format!("{}/public/{}/{}", self.base_url, self.bucket, object_name)
    }

    /// The object is written with the account's token so bucket policies see the uploader.
    fn upload_request(
        &self,
        session: &Session,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> reqwest::Result<Request> {
        self.client
            .post(format!("{}/{}/{}", self.base_url, self.bucket, object_name))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .build()
    }
}

impl BlobStore for StorageClient {
    async fn upload(
        &self,
        session: &Session,
        object_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let request = self.upload_request(session, object_name, bytes, content_type)?;
        let response = self.client.execute(request).await?;

        check_response(response, "Object").await?;
        tracing::debug!("Uploaded {} to bucket {}", object_name, self.bucket);

        Ok(self.public_url(object_name))
    }
}

/// Storage name for a user's uploaded image: `<user id>-<unix millis>.<ext>`.
pub fn image_object_name(user_id: Uuid, file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin")
        .to_lowercase();
    format!("{}-{}.{}", user_id, Utc::now().timestamp_millis(), extension)
}

pub fn image_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Account;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn test_public_url() {
        let storage = StorageClient::new(
            "https://project.example.co",
            "anon".to_string(),
            "profile-images".to_string(),
        );
        assert_eq!(
            storage.public_url("a.png"),
            "https://project.example.co/storage/v1/object/public/profile-images/a.png"
        );
    }

    #[test]
    fn test_upload_bears_session_token() {
        let storage = StorageClient::new(
            "https://project.example.co",
            "anon".to_string(),
            "profile-images".to_string(),
        );
        let session = Session {
            account: Account {
                id: Uuid::new_v4(),
                email: "ada@example.com".to_string(),
                full_name: None,
            },
            access_token: "user-jwt".to_string(),
            refresh_token: None,
        };

        let request = storage
            .upload_request(&session, "a.png", vec![1, 2, 3], "image/png")
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://project.example.co/storage/v1/object/profile-images/a.png"
        );
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer user-jwt");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()[CONTENT_TYPE], "image/png");
    }

    #[test]
    fn test_image_object_name() {
        let user_id = Uuid::new_v4();
        let name = image_object_name(user_id, "Avatar.PNG");
        assert!(name.starts_with(&format!("{}-", user_id)));
        assert!(name.ends_with(".png"));
        assert!(image_object_name(user_id, "noext").ends_with(".bin"));
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("me.JPG"), "image/jpeg");
        assert_eq!(image_content_type("me.webp"), "image/webp");
        assert_eq!(image_content_type("notes.txt"), FALLBACK_CONTENT_TYPE);
    }
}

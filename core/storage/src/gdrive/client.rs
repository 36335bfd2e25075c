//! Google Drive API client.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use authbackup_common::Result;

use crate::provider::{api_outcome, ApiOutcome, ErrorEnvelope};
use crate::transport::{HttpRequest, Transport};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Account information lives in the v2 API.
const ABOUT_URL: &str = "https://www.googleapis.com/drive/v2/about?fields=user";

/// Name of the folder backups are written to.
pub const BACKUP_FOLDER_NAME: &str = "Authenticator Backups";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// Multipart boundary for uploads.
const BOUNDARY: &str = "segment_marker";

/// Whether a cached folder id still points at a usable folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    Present,
    /// Deleted, trashed or never existed.
    Gone,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
}

#[derive(Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
}

/// `files.get?fields=trashed`.
#[derive(Debug, Deserialize)]
struct FolderStatus {
    trashed: Option<bool>,
}

/// `files.create` reply.
#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: Option<String>,
}

/// `about?fields=user`.
#[derive(Debug, Deserialize)]
struct About {
    user: Option<AboutUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    email_address: Option<String>,
}

/// Thin client over the Drive REST endpoints the backup needs.
pub struct DriveClient {
    transport: Arc<dyn Transport>,
}

impl DriveClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Check whether a folder exists and is not trashed.
    pub async fn folder_state(&self, token: &str, folder_id: &str) -> Result<ApiOutcome<FolderState>> {
        let url = format!("{}/files/{}?fields=trashed", DRIVE_API_BASE, folder_id);
        let request = HttpRequest::get(url)
            .bearer(token)
            .header("Accept", "application/json");

        let response = self.transport.send(request).await?;
        if response.is_not_found() {
            return Ok(ApiOutcome::Success(FolderState::Gone));
        }

        if !response.is_unauthorized() {
            let body: ErrorEnvelope = response.json()?;
            if body.status_code() == Some(404) {
                return Ok(ApiOutcome::Success(FolderState::Gone));
            }
        }

        Ok(api_outcome::<FolderStatus>(&response)?.map(|status| {
            if status.trashed == Some(true) {
                FolderState::Gone
            } else {
                FolderState::Present
            }
        }))
    }

    /// Create the backup folder in the drive root and return its id.
    pub async fn create_folder(&self, token: &str) -> Result<ApiOutcome<String>> {
        let metadata = serde_json::to_string(&FolderMetadata {
            name: BACKUP_FOLDER_NAME,
            mime_type: FOLDER_MIME_TYPE,
        })?;
        let request = HttpRequest::post(format!("{}/files/", DRIVE_API_BASE))
            .bearer(token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(metadata);

        let response = self.transport.send(request).await?;
        Ok(api_outcome::<CreatedFile>(&response)?.require("id", |file| file.id))
    }

    /// Upload a new file into a folder. Drive never overwrites: every call
    /// creates a new object.
    pub async fn upload(
        &self,
        token: &str,
        folder_id: &str,
        name: &str,
        contents: &str,
    ) -> Result<ApiOutcome<()>> {
        let body = multipart_body(name, folder_id, contents)?;
        let request = HttpRequest::post(format!("{}/files?uploadType=multipart", DRIVE_UPLOAD_BASE))
            .bearer(token)
            .header(
                "Content-type",
                format!("multipart/related; boundary={}", BOUNDARY),
            )
            .body(body);

        let response = self.transport.send(request).await?;
        Ok(api_outcome::<IgnoredAny>(&response)?.map(|_| ()))
    }

    /// Email address of the connected account.
    pub async fn about(&self, token: &str) -> Result<ApiOutcome<String>> {
        let response = self
            .transport
            .send(HttpRequest::get(ABOUT_URL).bearer(token))
            .await?;

        Ok(api_outcome::<About>(&response)?
            .require("user.emailAddress", |about| about.user.and_then(|u| u.email_address)))
    }
}

/// `multipart/related` body: JSON metadata part, then the file part.
fn multipart_body(name: &str, folder_id: &str, contents: &str) -> Result<String> {
    let metadata = serde_json::to_string(&FileMetadata {
        name,
        parents: [folder_id],
    })?;
    let delimiter = format!("--{}", BOUNDARY);
    let closing = format!("--{}--", BOUNDARY);

    let lines = [
        delimiter.as_str(),
        "Content-Type: application/json; charset=UTF-8",
        "",
        metadata.as_str(),
        "",
        delimiter.as_str(),
        "Content-Type: application/octet-stream",
        "",
        contents,
        closing.as_str(),
    ];

    let mut body = String::with_capacity(contents.len() + 256);
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::transport::Method;
    use serde_json::json;

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body("20240115.json", "folder-1", "{}").unwrap();
        assert_eq!(
            body,
            "--segment_marker\n\
             Content-Type: application/json; charset=UTF-8\n\
             \n\
             {\"name\":\"20240115.json\",\"parents\":[\"folder-1\"]}\n\
             \n\
             --segment_marker\n\
             Content-Type: application/octet-stream\n\
             \n\
             {}\n\
             --segment_marker--\n"
        );
    }

    #[tokio::test]
    async fn test_folder_state() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({"trashed": false}));
        transport.respond(200, json!({"trashed": true}));
        transport.respond(404, json!({"error": {"code": 404}}));
        transport.respond(200, json!({"error": {"code": 404, "message": "File not found"}}));
        transport.respond(200, json!({"error": {"code": 403, "message": "Rate limit"}}));
        transport.respond_text(401, "");

        let client = DriveClient::new(transport.clone());
        let mut results = Vec::new();
        for _ in 0..6 {
            results.push(client.folder_state("tok", "folder-1").await.unwrap());
        }

        assert_eq!(
            results,
            vec![
                ApiOutcome::Success(FolderState::Present),
                ApiOutcome::Success(FolderState::Gone),
                ApiOutcome::Success(FolderState::Gone),
                ApiOutcome::Success(FolderState::Gone),
                ApiOutcome::Failed("Rate limit".to_string()),
                ApiOutcome::Unauthorized,
            ]
        );

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://www.googleapis.com/drive/v3/files/folder-1?fields=trashed"
        );
        assert_eq!(request.header_value("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_create_folder_request() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({"id": "new-folder", "kind": "drive#file"}));

        let client = DriveClient::new(transport.clone());
        assert_eq!(
            client.create_folder("tok").await.unwrap(),
            ApiOutcome::Success("new-folder".to_string())
        );

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://www.googleapis.com/drive/v3/files/");
        assert_eq!(request.header_value("Content-Type"), Some("application/json"));
        assert_eq!(
            request.body_text(),
            Some(r#"{"name":"Authenticator Backups","mimeType":"application/vnd.google-apps.folder"}"#)
        );
    }

    #[tokio::test]
    async fn test_create_folder_without_id() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({"kind": "drive#file"}));

        let client = DriveClient::new(transport);
        assert_eq!(
            client.create_folder("tok").await.unwrap(),
            ApiOutcome::Failed("Protocol error: Response has no id".to_string())
        );
    }

    #[tokio::test]
    async fn test_about() {
        let transport = ScriptedTransport::new();
        transport.respond(200, json!({"user": {"emailAddress": "me@gmail.com"}}));
        transport.respond(200, json!({"user": {}}));

        let client = DriveClient::new(transport.clone());
        assert_eq!(
            client.about("tok").await.unwrap(),
            ApiOutcome::Success("me@gmail.com".to_string())
        );
        assert_eq!(
            client.about("tok").await.unwrap(),
            ApiOutcome::Failed("Protocol error: Response has no user.emailAddress".to_string())
        );
        assert_eq!(transport.requests()[0].url, ABOUT_URL);
    }
}

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    sanitize_file_name, Conversion, ConversionRequest, ConvertStrategy, DocumentClass,
    StrategyKind,
};
use crate::config::ApiCredentials;
use crate::error::{ConvertError, Result};
use crate::pdf::{encode_jpeg, page_count, prepare_image};

/// Delegates the conversion to a hosted office/image-to-PDF API
/// (iLovePDF-compatible task flow: auth, start, upload, process, download).
pub struct ExternalApiStrategy {
    credentials: Option<ApiCredentials>,
    base_url: String,
    temp_dir: PathBuf,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
struct StartResponse {
    server: String,
    task: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    server_filename: String,
}

impl ExternalApiStrategy {
    pub fn new(credentials: Option<ApiCredentials>, base_url: String, temp_dir: PathBuf) -> Self {
        Self {
            credentials,
            base_url,
            temp_dir,
            client: reqwest::Client::new(),
        }
    }

    fn tool_for(class: DocumentClass) -> &'static str {
        match class {
            DocumentClass::Spreadsheet | DocumentClass::WordDoc => "officepdf",
            DocumentClass::Image => "imagepdf",
        }
    }

    /// Write one upload payload into the managed temp dir. The handle keeps
    /// the file alive for the duration of the call and removes it on drop.
    fn stage_payload(&self, data: &[u8]) -> Result<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix(&format!("upload_{}_", Uuid::new_v4()))
            .tempfile_in(&self.temp_dir)?;
        std::fs::write(file.path(), data)?;
        Ok(file)
    }

    async fn request_token(&self, credentials: &ApiCredentials) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v2/auth", self.base_url))
            .json(&json!({ "public_key": credentials.public_key }))
            .send()
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("auth request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ConvertError::StrategyExecution(format!("auth rejected: {e}")))?;
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("bad auth response: {e}")))?;
        Ok(auth.token)
    }

    async fn run_task(
        &self,
        token: &str,
        tool: &str,
        uploads: Vec<(NamedTempFile, String)>,
    ) -> Result<Vec<u8>> {
        let started: StartResponse = self
            .get_json(
                format!("{}/v2/start/{tool}", self.base_url),
                token,
                "start task",
            )
            .await?;
        debug!("task {} assigned to {}", started.task, started.server);

        let worker = format!("https://{}", started.server);
        let mut files = Vec::new();
        for (staged, file_name) in &uploads {
            let data = tokio::fs::read(staged.path()).await?;
            let form = reqwest::multipart::Form::new()
                .text("task", started.task.clone())
                .part(
                    "file",
                    reqwest::multipart::Part::bytes(data).file_name(file_name.clone()),
                );
            let upload: UploadResponse = self
                .send_json(
                    self.client
                        .post(format!("{worker}/v2/upload"))
                        .bearer_auth(token)
                        .multipart(form),
                    "upload",
                )
                .await?;
            files.push(json!({
                "server_filename": upload.server_filename,
                "filename": file_name,
            }));
        }

        let process = self
            .client
            .post(format!("{worker}/v2/process"))
            .bearer_auth(token)
            .json(&json!({ "task": started.task, "tool": tool, "files": files }));
        self.send_ok(process, "process").await?;

        let download = self
            .client
            .get(format!("{worker}/v2/download/{}", started.task))
            .bearer_auth(token);
        let bytes = self
            .send_ok(download, "download")
            .await?
            .bytes()
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("download failed: {e}")))?;

        // `uploads` drops here, deleting every staged temp file.
        Ok(bytes.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        token: &str,
        what: &str,
    ) -> Result<T> {
        self.send_json(self.client.get(url).bearer_auth(token), what)
            .await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send_ok(request, what)
            .await?
            .json()
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("bad {what} response: {e}")))
    }

    async fn send_ok(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("{what} request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ConvertError::StrategyExecution(format!("{what} rejected: {e}")))
    }
}

#[async_trait]
impl ConvertStrategy for ExternalApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExternalApi
    }

    fn supports(&self, _class: DocumentClass) -> bool {
        true
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<Conversion> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            ConvertError::Configuration("external API credentials are not configured".into())
        })?;

        let stem = sanitize_file_name(&request.options.file_name_stem);
        let tool = Self::tool_for(request.class);

        let uploads = match request.class {
            DocumentClass::Spreadsheet => {
                let staged = self.stage_payload(request.payload.single()?)?;
                vec![(staged, format!("{stem}.xlsx"))]
            }
            DocumentClass::WordDoc => {
                let staged = self.stage_payload(request.payload.single()?)?;
                vec![(staged, format!("{stem}.docx"))]
            }
            DocumentClass::Image => {
                // The API takes JPEG; re-encode with the requested quality
                // (and normalize EXIF rotation on the way).
                let mut uploads = Vec::new();
                for (i, data) in request.payload.images().iter().enumerate() {
                    let prepared = prepare_image(data)?;
                    let jpeg = encode_jpeg(&prepared, request.options.quality_pct)?;
                    uploads.push((self.stage_payload(&jpeg)?, format!("{stem}_{i}.jpg")));
                }
                if uploads.is_empty() {
                    return Err(ConvertError::Validation("no images provided".into()));
                }
                uploads
            }
        };

        info!("delegating {tool} task with {} file(s)", uploads.len());
        let token = self.request_token(credentials).await?;
        let bytes = self.run_task(&token, tool, uploads).await?;
        let pages = page_count(&bytes);

        Ok(Conversion {
            bytes,
            file_name: format!("{stem}.pdf"),
            mime_type: mime::APPLICATION_PDF.to_string(),
            page_count: pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{ConvertOptions, Payload};
    use bytes::Bytes;

    fn strategy(credentials: Option<ApiCredentials>) -> ExternalApiStrategy {
        ExternalApiStrategy::new(
            credentials,
            "https://api.invalid".into(),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn missing_credentials_is_a_configuration_error() {
        let request = ConversionRequest {
            class: DocumentClass::WordDoc,
            payload: Payload::Single(Bytes::from_static(b"doc")),
            options: ConvertOptions::default(),
        };
        let err = strategy(None).convert(&request).await.unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn tools_follow_document_class() {
        assert_eq!(
            ExternalApiStrategy::tool_for(DocumentClass::Spreadsheet),
            "officepdf"
        );
        assert_eq!(
            ExternalApiStrategy::tool_for(DocumentClass::Image),
            "imagepdf"
        );
    }

    #[test]
    fn staged_payload_is_removed_on_drop() {
        let s = strategy(None);
        let path = {
            let staged = s.stage_payload(b"bytes").unwrap();
            assert!(staged.path().exists());
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}

//! HTTPS document service speaking a Drive-v3-shaped REST API.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request, Uri};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::http_client::{HyperClient, build_https_client, send};
use crate::traits::{BearerToken, DocumentService, RemoteError, RemoteResult};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DOCUMENT_MIME_TYPE: &str = "application/json";

/// Configuration for [`DriveService`].
#[derive(Clone, Debug)]
pub struct DriveConfig {
    api_base_url: String,
    upload_base_url: String,
    timeout: Duration,
}

impl DriveConfig {
    /// Creates a configuration pointing at the public Google endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/".to_owned(),
            upload_base_url: "https://www.googleapis.com/upload/".to_owned(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Overrides the base URL used for metadata and download calls.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Configuration`] if the supplied URL is invalid.
    pub fn with_api_base_url(mut self, base_url: impl AsRef<str>) -> RemoteResult<Self> {
        self.api_base_url = sanitize_base_url(base_url.as_ref())?;
        Ok(self)
    }

    /// Overrides the base URL used for media uploads.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Configuration`] if the supplied URL is invalid.
    pub fn with_upload_base_url(mut self, base_url: impl AsRef<str>) -> RemoteResult<Self> {
        self.upload_base_url = sanitize_base_url(base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Document service backed by the Drive v3 files API.
pub struct DriveService {
    client: HyperClient,
    api_base: Url,
    upload_base: Url,
    timeout: Duration,
}

impl fmt::Debug for DriveService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveService")
            .field("api_base", &self.api_base.as_str())
            .field("upload_base", &self.upload_base.as_str())
            .finish_non_exhaustive()
    }
}

impl DriveService {
    /// Constructs the service from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Configuration`] if a base URL is invalid or the
    /// HTTP client cannot be constructed.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(config: DriveConfig) -> RemoteResult<Self> {
        let api_base = parse_url(&config.api_base_url)?;
        let upload_base = parse_url(&config.upload_base_url)?;
        Ok(Self {
            client: build_https_client()?,
            api_base,
            upload_base,
            timeout: config.timeout,
        })
    }

    fn files_url(&self, path: &str, query: &[(&str, &str)]) -> RemoteResult<Uri> {
        build_uri(&self.api_base, path, query)
    }

    async fn search(&self, token: &BearerToken, query: &str, name: &str) -> RemoteResult<Option<String>> {
        let uri = self.files_url(
            "drive/v3/files",
            &[("q", query), ("fields", "files(id,name)"), ("spaces", "drive")],
        )?;
        let request = authorized(Method::GET, uri, token, None, Body::empty())?;

        let bytes = send(&self.client, request, self.timeout, "file search").await?;
        let listing: FileList = serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::decode(format!("failed to decode file listing: {err}")))?;

        Ok(listing
            .files
            .into_iter()
            .find(|file| file.name.as_deref() == Some(name))
            .map(|file| file.id))
    }

    async fn create(&self, token: &BearerToken, metadata: &CreateFile<'_>) -> RemoteResult<String> {
        let uri = self.files_url("drive/v3/files", &[("fields", "id")])?;
        let body = serde_json::to_vec(metadata)
            .map_err(|err| RemoteError::configuration(format!("failed to encode metadata: {err}")))?;
        let request = authorized(
            Method::POST,
            uri,
            token,
            Some("application/json"),
            Body::from(body),
        )?;

        let bytes = send(&self.client, request, self.timeout, metadata.name).await?;
        let created: FileEntry = serde_json::from_slice(&bytes)
            .map_err(|err| RemoteError::decode(format!("failed to decode created file: {err}")))?;
        debug!(name = metadata.name, id = %created.id, "remote file created");
        Ok(created.id)
    }
}

#[async_trait]
impl DocumentService for DriveService {
    async fn find_container(&self, token: &BearerToken, name: &str) -> RemoteResult<Option<String>> {
        let query = format!(
            "name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false",
            escape_query_literal(name)
        );
        self.search(token, &query, name).await
    }

    async fn create_container(&self, token: &BearerToken, name: &str) -> RemoteResult<String> {
        let metadata = CreateFile {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: None,
        };
        self.create(token, &metadata).await
    }

    async fn find_document(
        &self,
        token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        let query = format!(
            "name='{}' and '{}' in parents and trashed=false",
            escape_query_literal(name),
            escape_query_literal(container_id)
        );
        self.search(token, &query, name).await
    }

    async fn create_document(
        &self,
        token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<String> {
        let metadata = CreateFile {
            name,
            mime_type: DOCUMENT_MIME_TYPE,
            parents: Some(vec![container_id]),
        };
        self.create(token, &metadata).await
    }

    async fn read_document(&self, token: &BearerToken, document_id: &str) -> RemoteResult<Bytes> {
        let path = format!("drive/v3/files/{}", path_segment(document_id)?);
        let uri = self.files_url(&path, &[("alt", "media")])?;
        let request = authorized(Method::GET, uri, token, None, Body::empty())?;
        send(&self.client, request, self.timeout, "prompt document").await
    }

    async fn replace_document(
        &self,
        token: &BearerToken,
        document_id: &str,
        body: Bytes,
    ) -> RemoteResult<()> {
        let path = format!("drive/v3/files/{}", path_segment(document_id)?);
        let uri = build_uri(&self.upload_base, &path, &[("uploadType", "media")])?;
        let request = authorized(
            Method::PATCH,
            uri,
            token,
            Some(DOCUMENT_MIME_TYPE),
            Body::from(body),
        )?;
        send(&self.client, request, self.timeout, "prompt document").await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFile<'a> {
    name: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<&'a str>>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

fn authorized(
    method: Method,
    uri: Uri,
    token: &BearerToken,
    content_type: Option<&str>,
    body: Body,
) -> RemoteResult<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, token.header_value());
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    builder
        .body(body)
        .map_err(|err| RemoteError::transport(format!("failed to build request: {err}")))
}

fn build_uri(base: &Url, path: &str, query: &[(&str, &str)]) -> RemoteResult<Uri> {
    let mut url = base
        .join(path)
        .map_err(|err| RemoteError::configuration(format!("invalid request path `{path}`: {err}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    url.as_str()
        .parse::<Uri>()
        .map_err(|err| RemoteError::configuration(format!("invalid request URI: {err}")))
}

fn path_segment(id: &str) -> RemoteResult<&str> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(RemoteError::configuration(format!(
            "document identifier `{id}` is not a valid path segment"
        )));
    }
    Ok(id)
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn parse_url(input: &str) -> RemoteResult<Url> {
    Url::parse(input).map_err(|err| RemoteError::configuration(format!("invalid base URL: {err}")))
}

fn sanitize_base_url(input: &str) -> RemoteResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(RemoteError::configuration(
            "remote base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    parse_url(&base)?;
    Ok(base)
}

//! Whole-document remote store client.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use prompt_primitives::Collection;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::retry::RetryPolicy;
use crate::traits::{
    BearerToken, CredentialProvider, DocumentService, RemoteError, RemoteResult, RemoteStore,
};

const EMPTY_COLLECTION: &[u8] = b"[]";

/// Names of the container and document holding the prompt collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLocation {
    container: String,
    document: String,
}

impl DocumentLocation {
    /// Creates a location from a container name and a document name.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Configuration`] when either name is blank.
    pub fn new(container: impl Into<String>, document: impl Into<String>) -> RemoteResult<Self> {
        let container = container.into();
        let document = document.into();
        if container.trim().is_empty() {
            return Err(RemoteError::configuration("container name cannot be empty"));
        }
        if document.trim().is_empty() {
            return Err(RemoteError::configuration("document name cannot be empty"));
        }
        Ok(Self {
            container,
            document,
        })
    }

    /// Returns the container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the document name.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }
}

/// Presents the remote collection as a single JSON document.
///
/// Container and document identifiers are resolved on first use and cached
/// for the lifetime of the client; a fresh client resolves them again.
pub struct RemoteStoreClient {
    service: Arc<dyn DocumentService>,
    credentials: Arc<dyn CredentialProvider>,
    location: DocumentLocation,
    retry: RetryPolicy,
    container_id: Mutex<Option<String>>,
    document_id: Mutex<Option<String>>,
}

impl fmt::Debug for RemoteStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStoreClient")
            .field("service", &"dyn DocumentService")
            .field("location", &self.location)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RemoteStoreClient {
    /// Creates a client over the supplied service and credential provider.
    #[must_use]
    pub fn new(
        service: Arc<dyn DocumentService>,
        credentials: Arc<dyn CredentialProvider>,
        location: DocumentLocation,
    ) -> Self {
        Self {
            service,
            credentials,
            location,
            retry: RetryPolicy::default(),
            container_id: Mutex::new(None),
            document_id: Mutex::new(None),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the configured location.
    #[must_use]
    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    /// Resolves the container identifier, creating the container if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Credential`] immediately when no token is
    /// available, or the last transport error once retries are exhausted.
    pub async fn locate_or_create_container(&self) -> RemoteResult<String> {
        let token = self.credentials.token().await?;
        self.container_id(&token).await
    }

    /// Resolves the document identifier, creating an empty document if needed.
    ///
    /// # Errors
    ///
    /// See [`RemoteStoreClient::locate_or_create_container`].
    pub async fn locate_or_create_document(&self) -> RemoteResult<String> {
        let token = self.credentials.token().await?;
        self.document_id(&token).await
    }

    async fn container_id(&self, token: &BearerToken) -> RemoteResult<String> {
        let mut cached = self.container_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let name = self.location.container();
        let id = self
            .retry
            .run("locate container", move || async move {
                if let Some(id) = self.service.find_container(token, name).await? {
                    return Ok(id);
                }
                let id = self.service.create_container(token, name).await?;
                info!(container = name, %id, "created remote container");
                Ok(id)
            })
            .await?;

        *cached = Some(id.clone());
        Ok(id)
    }

    async fn document_id(&self, token: &BearerToken) -> RemoteResult<String> {
        let mut cached = self.document_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let container = self.container_id(token).await?;
        let name = self.location.document();
        let container = container.as_str();
        let resolved = self
            .retry
            .run("locate document", move || async move {
                if let Some(id) = self.service.find_document(token, container, name).await? {
                    return Ok(id);
                }
                let id = self.service.create_document(token, container, name).await?;
                self.service
                    .replace_document(token, &id, Bytes::from_static(EMPTY_COLLECTION))
                    .await?;
                info!(document = name, %id, "created remote document");
                Ok(id)
            })
            .await;

        let id = match resolved {
            Ok(id) => id,
            Err(err @ RemoteError::NotFound { .. }) => {
                debug!(container, "cached container is gone; resolving again on next call");
                self.container_id.lock().await.take();
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        *cached = Some(id.clone());
        Ok(id)
    }

    async fn forget_location(&self) {
        self.document_id.lock().await.take();
        self.container_id.lock().await.take();
    }

    async fn replace(&self, token: &BearerToken, body: &Bytes) -> RemoteResult<()> {
        let id = self.document_id(token).await?;
        let id = id.as_str();
        self.retry
            .run("write collection", move || {
                self.service.replace_document(token, id, body.clone())
            })
            .await
    }
}

#[async_trait]
impl RemoteStore for RemoteStoreClient {
    async fn fetch_collection(&self) -> RemoteResult<Collection> {
        let token = self.credentials.token().await?;
        let id = self.document_id(&token).await?;
        let token = &token;
        let id = id.as_str();

        match self
            .retry
            .run("fetch collection", move || self.service.read_document(token, id))
            .await
        {
            Ok(body) => decode_collection(&body),
            Err(RemoteError::NotFound { .. }) => {
                debug!(document = id, "remote document missing; treating as empty");
                self.forget_location().await;
                Ok(Collection::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn write_collection(&self, collection: &Collection) -> RemoteResult<()> {
        let body = encode_collection(collection)?;
        let token = self.credentials.token().await?;

        match self.replace(&token, &body).await {
            Err(RemoteError::NotFound { .. }) => {
                debug!("remote document vanished; resolving again before writing");
                self.forget_location().await;
                self.replace(&token, &body).await
            }
            other => other,
        }?;

        debug!(prompts = collection.len(), bytes = body.len(), "remote collection written");
        Ok(())
    }
}

/// Encodes a collection as a remote document body.
///
/// # Errors
///
/// Returns [`RemoteError::Configuration`] when the collection cannot be
/// serialized.
pub fn encode_collection(collection: &Collection) -> RemoteResult<Bytes> {
    serde_json::to_vec(collection)
        .map(Bytes::from)
        .map_err(|err| RemoteError::configuration(format!("failed to encode collection: {err}")))
}

/// Decodes a remote document body. A blank body reads as an empty collection.
///
/// # Errors
///
/// Returns [`RemoteError::Decode`] when the body is not a JSON array of prompts.
pub fn decode_collection(body: &[u8]) -> RemoteResult<Collection> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Collection::new());
    }
    serde_json::from_slice(body)
        .map_err(|err| RemoteError::decode(format!("prompt document is not a prompt array: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use std::time::Duration;

    use prompt_primitives::{Prompt, PromptDraft, PromptId};

    use crate::memory::InMemoryDocumentService;
    use crate::traits::StaticCredentials;

    struct DeniedCredentials;

    #[async_trait]
    impl CredentialProvider for DeniedCredentials {
        async fn token(&self) -> RemoteResult<BearerToken> {
            Err(RemoteError::credential("consent denied"))
        }
    }

    fn new_client(service: &Arc<InMemoryDocumentService>) -> RemoteStoreClient {
        RemoteStoreClient::new(
            Arc::clone(service) as Arc<dyn DocumentService>,
            Arc::new(StaticCredentials::new("token")),
            DocumentLocation::new("PromptManager", "prompts.json").unwrap(),
        )
        .with_retry_policy(RetryPolicy::new(
            NonZeroU32::new(3).unwrap(),
            Duration::from_millis(1),
        ))
    }

    fn prompt(id: i64, name: &str) -> Prompt {
        Prompt::create(PromptId::from_millis(id), PromptDraft::new(name, "text")).unwrap()
    }

    #[test]
    fn location_rejects_blank_names() {
        assert!(DocumentLocation::new(" ", "prompts.json").is_err());
        assert!(DocumentLocation::new("PromptManager", "").is_err());
    }

    #[tokio::test]
    async fn first_fetch_creates_container_and_empty_document() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);

        let collection = client.fetch_collection().await.unwrap();
        assert!(collection.is_empty());
        assert_eq!(service.container_count().await, 1);
        assert_eq!(
            service.document_body("PromptManager", "prompts.json").await.as_deref(),
            Some(&b"[]"[..])
        );
    }

    #[tokio::test]
    async fn identifiers_are_cached_per_client() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);

        let first = client.locate_or_create_document().await.unwrap();
        let searches = service.search_count().await;
        let second = client.locate_or_create_document().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.search_count().await, searches);

        // A fresh client resolves again but finds the existing entries.
        let other = new_client(&service);
        assert_eq!(other.locate_or_create_document().await.unwrap(), first);
        assert_eq!(service.container_count().await, 1);
    }

    #[tokio::test]
    async fn write_then_fetch_round_trips() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        let collection = Collection::from(vec![prompt(2, "b"), prompt(1, "a")]);

        client.write_collection(&collection).await.unwrap();
        assert_eq!(client.fetch_collection().await.unwrap(), collection);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let service = Arc::new(InMemoryDocumentService::new());
        service
            .put_document("PromptManager", "prompts.json", "not json")
            .await;
        let err = new_client(&service).fetch_collection().await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }));
    }

    #[tokio::test]
    async fn wrong_shape_is_a_decode_error() {
        let service = Arc::new(InMemoryDocumentService::new());
        service
            .put_document("PromptManager", "prompts.json", r#"{"prompts": []}"#)
            .await;
        let err = new_client(&service).fetch_collection().await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode { .. }));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        client.locate_or_create_document().await.unwrap();

        service.fail_next(2, RemoteError::transport("connection reset")).await;
        let collection = client.fetch_collection().await.unwrap();
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        client.locate_or_create_document().await.unwrap();

        service
            .fail_next(
                3,
                RemoteError::Status {
                    status: 503,
                    reason: "unavailable".into(),
                },
            )
            .await;
        let err = client.fetch_collection().await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn credential_failure_is_not_retried() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = RemoteStoreClient::new(
            Arc::clone(&service) as Arc<dyn DocumentService>,
            Arc::new(DeniedCredentials),
            DocumentLocation::new("PromptManager", "prompts.json").unwrap(),
        );
        let err = client.fetch_collection().await.unwrap_err();
        assert!(matches!(err, RemoteError::Credential { .. }));
        assert_eq!(service.search_count().await, 0);
    }

    #[tokio::test]
    async fn deleted_document_is_recreated_on_write() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        client.write_collection(&Collection::new()).await.unwrap();

        service.trash_document("PromptManager", "prompts.json").await;
        let collection = Collection::from(vec![prompt(5, "e")]);
        client.write_collection(&collection).await.unwrap();

        assert_eq!(client.fetch_collection().await.unwrap(), collection);
    }

    #[tokio::test]
    async fn missing_document_reads_as_empty() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        client
            .write_collection(&Collection::from(vec![prompt(1, "a")]))
            .await
            .unwrap();

        service.trash_document("PromptManager", "prompts.json").await;
        assert!(client.fetch_collection().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trashed_container_is_resolved_again() {
        let service = Arc::new(InMemoryDocumentService::new());
        let client = new_client(&service);
        client.locate_or_create_container().await.unwrap();

        service.trash_container("PromptManager").await;
        let err = client.fetch_collection().await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound { .. }));

        assert!(client.fetch_collection().await.unwrap().is_empty());
        assert_eq!(service.container_count().await, 1);
        assert_eq!(
            service.document_body("PromptManager", "prompts.json").await.as_deref(),
            Some(&b"[]"[..])
        );
    }

    #[test]
    fn encoded_collection_is_a_json_array() {
        let collection = Collection::from(vec![prompt(2, "b"), prompt(1, "a")]);
        let body = encode_collection(&collection).unwrap();
        assert!(body.starts_with(b"["));
        assert_eq!(decode_collection(&body).unwrap(), collection);
    }

    #[test]
    fn blank_body_decodes_as_empty() {
        assert!(decode_collection(b"  \n").unwrap().is_empty());
    }
}

//! In-process document service for tests and offline demos.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::traits::{BearerToken, DocumentService, RemoteError, RemoteResult};

#[derive(Debug)]
struct Container {
    id: String,
    name: String,
    trashed: bool,
}

#[derive(Debug)]
struct Document {
    id: String,
    name: String,
    parent: String,
    body: Bytes,
    trashed: bool,
}

#[derive(Debug, Default)]
struct ServiceState {
    containers: Vec<Container>,
    documents: Vec<Document>,
    next_id: u64,
    failures: VecDeque<RemoteError>,
    searches: usize,
    reads: usize,
    writes: usize,
}

impl ServiceState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn take_failure(&mut self) -> RemoteResult<()> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn live_container(&self, name: &str) -> Option<&Container> {
        self.containers
            .iter()
            .find(|container| !container.trashed && container.name == name)
    }

    fn live_document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents
            .iter_mut()
            .find(|document| !document.trashed && document.id == id)
    }
}

/// [`DocumentService`] holding containers and documents in memory.
///
/// Supports injecting failures and latency so callers can exercise retry and
/// concurrency behaviour without a network.
#[derive(Debug, Default)]
pub struct InMemoryDocumentService {
    state: Mutex<ServiceState>,
    latency: Option<Duration>,
}

impl InMemoryDocumentService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `count` calls fail with `error`.
    pub async fn fail_next(&self, count: usize, error: RemoteError) {
        let mut state = self.state.lock().await;
        state
            .failures
            .extend(std::iter::repeat_n(error, count));
    }

    /// Discards any pending injected failures.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    /// Stores `body` as the named document, creating the container and document as needed.
    pub async fn put_document(&self, container: &str, document: &str, body: impl Into<Bytes>) {
        let mut state = self.state.lock().await;
        let parent = match state.live_container(container) {
            Some(existing) => existing.id.clone(),
            None => {
                let id = state.allocate_id("folder");
                state.containers.push(Container {
                    id: id.clone(),
                    name: container.to_owned(),
                    trashed: false,
                });
                id
            }
        };

        let body = body.into();
        if let Some(existing) = state
            .documents
            .iter_mut()
            .find(|doc| !doc.trashed && doc.parent == parent && doc.name == document)
        {
            existing.body = body;
            return;
        }

        let id = state.allocate_id("file");
        state.documents.push(Document {
            id,
            name: document.to_owned(),
            parent,
            body,
            trashed: false,
        });
    }

    /// Returns the body of the named live document.
    pub async fn document_body(&self, container: &str, document: &str) -> Option<Bytes> {
        let state = self.state.lock().await;
        let parent = state.live_container(container)?.id.clone();
        state
            .documents
            .iter()
            .find(|doc| !doc.trashed && doc.parent == parent && doc.name == document)
            .map(|doc| doc.body.clone())
    }

    /// Moves the named document to the trash.
    pub async fn trash_document(&self, container: &str, document: &str) {
        let mut state = self.state.lock().await;
        let Some(parent) = state.live_container(container).map(|c| c.id.clone()) else {
            return;
        };
        for doc in &mut state.documents {
            if doc.parent == parent && doc.name == document {
                doc.trashed = true;
            }
        }
    }

    /// Moves the named container to the trash. Its documents become unreachable.
    pub async fn trash_container(&self, name: &str) {
        let mut state = self.state.lock().await;
        for container in &mut state.containers {
            if container.name == name {
                container.trashed = true;
            }
        }
    }

    /// Returns the number of live containers.
    pub async fn container_count(&self) -> usize {
        let state = self.state.lock().await;
        state.containers.iter().filter(|c| !c.trashed).count()
    }

    /// Returns the number of search calls served.
    pub async fn search_count(&self) -> usize {
        self.state.lock().await.searches
    }

    /// Returns the number of document reads served.
    pub async fn read_count(&self) -> usize {
        self.state.lock().await.reads
    }

    /// Returns the number of document replacements served.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentService for InMemoryDocumentService {
    async fn find_container(&self, _token: &BearerToken, name: &str) -> RemoteResult<Option<String>> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.searches += 1;
        Ok(state.live_container(name).map(|c| c.id.clone()))
    }

    async fn create_container(&self, _token: &BearerToken, name: &str) -> RemoteResult<String> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        let id = state.allocate_id("folder");
        state.containers.push(Container {
            id: id.clone(),
            name: name.to_owned(),
            trashed: false,
        });
        Ok(id)
    }

    async fn find_document(
        &self,
        _token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.searches += 1;
        Ok(state
            .documents
            .iter()
            .find(|doc| !doc.trashed && doc.parent == container_id && doc.name == name)
            .map(|doc| doc.id.clone()))
    }

    async fn create_document(
        &self,
        _token: &BearerToken,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<String> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        if !state.containers.iter().any(|c| !c.trashed && c.id == container_id) {
            return Err(RemoteError::not_found(format!("container {container_id}")));
        }
        let id = state.allocate_id("file");
        state.documents.push(Document {
            id: id.clone(),
            name: name.to_owned(),
            parent: container_id.to_owned(),
            body: Bytes::new(),
            trashed: false,
        });
        Ok(id)
    }

    async fn read_document(&self, _token: &BearerToken, document_id: &str) -> RemoteResult<Bytes> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.reads += 1;
        state
            .live_document_mut(document_id)
            .map(|doc| doc.body.clone())
            .ok_or_else(|| RemoteError::not_found(format!("document {document_id}")))
    }

    async fn replace_document(
        &self,
        _token: &BearerToken,
        document_id: &str,
        body: Bytes,
    ) -> RemoteResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.writes += 1;
        let doc = state
            .live_document_mut(document_id)
            .ok_or_else(|| RemoteError::not_found(format!("document {document_id}")))?;
        doc.body = body;
        Ok(())
    }
}

//! Sync orchestration over a local cache and a remote store.
//!
//! A [`SyncSession`] owns the displayed collection. Reads are served from
//! memory, mutations commit to memory and the local cache before returning,
//! and remote traffic happens in the background.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use prompt_cache::LocalCache;
use prompt_primitives::{Collection, Prompt, PromptDraft, PromptId, now_millis};
use prompt_remote::traits::{RemoteError, RemoteResult, RemoteStore};
use tokio::sync::{Mutex, broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncErrorKind, SyncResult, remote_kind};
use crate::inject::{InjectionOutcome, TextInjector};
use crate::lifecycle::{SyncEvent, SyncMachine, SyncState};
use crate::notice::{ChangeKind, SyncNotice};
use crate::periodic::PeriodicSync;
use crate::queue::WriteQueue;
use crate::reconciler::reconcile;

/// Default interval between background syncs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

const DEFAULT_NOTICE_CAPACITY: usize = 64;

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The merged collection matched what was displayed.
    Unchanged,
    /// The displayed collection and the cache were replaced.
    Updated,
    /// Another refresh was already in flight; nothing was fetched.
    Collapsed,
    /// The session closed while fetching; the result was dropped.
    Discarded,
}

/// Final status of a background remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// The remote document was rewritten.
    Written,
    /// The remote copy already reflected the change.
    Unchanged,
    /// The write failed; the local change stands.
    Failed {
        /// Failure category.
        kind: SyncErrorKind,
        /// Human-readable detail.
        message: String,
    },
    /// The session closed before the write started.
    Skipped,
}

/// Handle to a background remote write. Dropping it detaches the write.
#[derive(Debug)]
pub struct Propagation {
    outcome: Option<oneshot::Receiver<PropagationOutcome>>,
}

impl Propagation {
    fn skipped() -> Self {
        Self { outcome: None }
    }

    /// Waits for the write to finish.
    pub async fn wait(self) -> PropagationOutcome {
        let Some(outcome) = self.outcome else {
            return PropagationOutcome::Skipped;
        };
        outcome.await.unwrap_or(PropagationOutcome::Skipped)
    }
}

/// A committed local mutation and its pending remote write.
#[derive(Debug)]
pub struct Mutation {
    prompt: Prompt,
    propagation: Propagation,
}

impl Mutation {
    /// The prompt that was created or removed.
    #[must_use]
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// Splits into the prompt and the propagation handle.
    #[must_use]
    pub fn into_parts(self) -> (Prompt, Propagation) {
        (self.prompt, self.propagation)
    }

    /// Waits for the remote write.
    pub async fn propagated(self) -> PropagationOutcome {
        self.propagation.wait().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Startup,
    Manual,
    Periodic,
}

struct LocalState {
    prompts: Collection,
    machine: SyncMachine,
    last_sync: Option<i64>,
    pending_deletes: HashSet<PromptId>,
}

pub(crate) struct SessionInner {
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn RemoteStore>,
    injector: Option<Arc<dyn TextInjector>>,
    local: Mutex<LocalState>,
    remote_cycle: Mutex<()>,
    refreshing: AtomicBool,
    closed: AtomicBool,
    notices: broadcast::Sender<SyncNotice>,
    writes: WriteQueue,
    sync_interval: Duration,
    check_interval: Duration,
}

struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.is_closed() {
            Err(SyncError::Closed)
        } else {
            Ok(())
        }
    }

    fn notify(&self, notice: SyncNotice) {
        // No receivers is fine.
        let _ = self.notices.send(notice);
    }

    pub(crate) const fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub(crate) async fn sync_due(&self) -> bool {
        let interval = i64::try_from(self.sync_interval.as_millis()).unwrap_or(i64::MAX);
        let last_sync = self.local.lock().await.last_sync;
        last_sync.is_none_or(|last| now_millis().saturating_sub(last) >= interval)
    }

    async fn load_cache(&self) -> SyncResult<SyncState> {
        self.ensure_open()?;
        let mut local = self.local.lock().await;
        local.machine.apply(SyncEvent::LoadCache)?;

        match self.cache.read().await {
            Ok(snapshot) => {
                local.last_sync = snapshot.last_sync();
                local.prompts = snapshot.into_prompts();
            }
            Err(err) => warn!(error = %err, "local cache unreadable; starting empty"),
        }

        if !local.prompts.is_empty() {
            let state = local.machine.apply(SyncEvent::CacheLoaded)?;
            let prompts = local.prompts.len();
            info!(prompts, "cached prompts loaded");
            self.notify(SyncNotice::Loaded { prompts });
            return Ok(state);
        }
        Ok(local.machine.state())
    }

    pub(crate) async fn refresh(&self, trigger: Trigger) -> SyncResult<RefreshOutcome> {
        self.ensure_open()?;
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!(?trigger, "sync already in flight; collapsing");
            return Ok(RefreshOutcome::Collapsed);
        };

        let _cycle = self.remote_cycle.lock().await;
        self.local.lock().await.machine.apply(SyncEvent::BeginSync)?;

        let fetched = self.remote.fetch_collection().await;
        if self.is_closed() {
            debug!(?trigger, "session closed during sync; discarding result");
            return Ok(RefreshOutcome::Discarded);
        }
        let mut remote = match fetched {
            Ok(remote) => remote,
            Err(err) => return Err(self.sync_failed(trigger, err).await),
        };

        let mut local = self.local.lock().await;
        for id in &local.pending_deletes {
            remote.remove(*id);
        }
        let merged = reconcile(&local.prompts, &remote);
        let changed = merged != local.prompts;
        if changed {
            if let Err(err) = self.cache.write(&merged).await {
                warn!(error = %err, "failed to persist merged collection");
            }
            local.prompts = merged;
        }
        local.last_sync = Some(now_millis());
        local.machine.apply(SyncEvent::SyncSucceeded)?;
        let prompts = local.prompts.len();
        drop(local);

        info!(?trigger, changed, prompts, "sync complete");
        if changed || trigger != Trigger::Periodic {
            self.notify(SyncNotice::Synced { changed, prompts });
        }

        Ok(if changed {
            RefreshOutcome::Updated
        } else {
            RefreshOutcome::Unchanged
        })
    }

    async fn sync_failed(&self, trigger: Trigger, err: RemoteError) -> SyncError {
        let state = {
            let mut local = self.local.lock().await;
            let has_data = !local.prompts.is_empty();
            match local.machine.apply(SyncEvent::SyncFailed { has_data }) {
                Ok(state) => state,
                Err(state_err) => return state_err.into(),
            }
        };
        warn!(?trigger, error = %err, ?state, "sync failed");
        // Background failures surface through the state only.
        if trigger != Trigger::Periodic {
            self.notify(SyncNotice::SyncFailed {
                kind: remote_kind(&err),
                message: err.to_string(),
                state,
            });
        }
        err.into()
    }

    async fn propagate(self: Arc<Self>, change: ChangeKind, prompt: Prompt) -> PropagationOutcome {
        let id = prompt.id();
        let result = {
            let _cycle = self.remote_cycle.lock().await;
            self.push_change(change, &prompt).await
        };
        if change == ChangeKind::Delete {
            self.local.lock().await.pending_deletes.remove(&id);
        }

        let quiet = self.is_closed();
        match result {
            Ok(true) => {
                debug!(prompt_id = %id, ?change, "remote write complete");
                if !quiet {
                    self.notify(SyncNotice::RemoteWritten { change, id });
                }
                PropagationOutcome::Written
            }
            Ok(false) => {
                debug!(prompt_id = %id, ?change, "remote already up to date");
                PropagationOutcome::Unchanged
            }
            Err(err) => {
                warn!(prompt_id = %id, ?change, error = %err, "remote write failed; local change kept");
                let kind = remote_kind(&err);
                let message = err.to_string();
                if !quiet {
                    self.notify(SyncNotice::RemoteWriteFailed {
                        change,
                        id,
                        kind,
                        message: message.clone(),
                    });
                }
                PropagationOutcome::Failed { kind, message }
            }
        }
    }

    async fn push_change(&self, change: ChangeKind, prompt: &Prompt) -> RemoteResult<bool> {
        let mut remote = self.remote.fetch_collection().await?;
        match change {
            ChangeKind::Create => remote.prepend(prompt.clone()),
            ChangeKind::Delete => {
                if remote.remove(prompt.id()).is_none() {
                    return Ok(false);
                }
            }
        }
        self.remote.write_collection(&remote).await?;
        Ok(true)
    }

    fn spawn_propagation(self: &Arc<Self>, change: ChangeKind, prompt: Prompt) -> Propagation {
        let task = Arc::clone(self).propagate(change, prompt);
        match self.writes.submit(task) {
            Ok(outcome) => Propagation {
                outcome: Some(outcome),
            },
            Err(err) => {
                debug!(%err, "remote propagation not scheduled");
                Propagation::skipped()
            }
        }
    }
}

/// Handle to a prompt collection kept in sync with a remote store.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SyncSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("cache", &"dyn LocalCache")
            .field("remote", &"dyn RemoteStore")
            .field("injector", &self.inner.injector.is_some())
            .field("sync_interval", &self.inner.sync_interval)
            .field("closed", &self.inner.is_closed())
            .finish_non_exhaustive()
    }
}

impl SyncSession {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SyncSessionBuilder {
        SyncSessionBuilder::default()
    }

    /// Snapshot of the displayed collection.
    pub async fn prompts(&self) -> Collection {
        self.inner.local.lock().await.prompts.clone()
    }

    /// Looks up a prompt by identity.
    pub async fn get(&self, id: PromptId) -> Option<Prompt> {
        self.inner.local.lock().await.prompts.get(id).cloned()
    }

    /// Current sync state.
    pub async fn state(&self) -> SyncState {
        self.inner.local.lock().await.machine.state()
    }

    /// Subscribes to session notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    /// Returns `true` once [`SyncSession::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Reads the local cache into memory without touching the remote.
    ///
    /// An unreadable cache is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] when called twice and
    /// [`SyncError::Closed`] after close.
    pub async fn load_cache(&self) -> SyncResult<SyncState> {
        self.inner.load_cache().await
    }

    /// Loads the cache, then runs the initial sync.
    ///
    /// A failed initial sync is not an error; it is reflected in the
    /// returned state ([`SyncState::Degraded`] or [`SyncState::Failed`]) and
    /// in a [`SyncNotice::SyncFailed`].
    ///
    /// # Errors
    ///
    /// Same as [`SyncSession::load_cache`].
    pub async fn start(&self) -> SyncResult<SyncState> {
        self.load_cache().await?;
        match self.inner.refresh(Trigger::Startup).await {
            Ok(outcome) => debug!(?outcome, "initial sync finished"),
            Err(err) => debug!(error = %err, kind = ?err.kind(), "initial sync failed"),
        }
        Ok(self.state().await)
    }

    /// Fetches the remote collection and reconciles it into the local one.
    ///
    /// Overlapping calls collapse: while one refresh is in flight, others
    /// return [`RefreshOutcome::Collapsed`] without fetching.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] when the fetch fails (the displayed
    /// collection is left untouched), [`SyncError::State`] before
    /// [`SyncSession::load_cache`], and [`SyncError::Closed`] after close.
    pub async fn refresh(&self) -> SyncResult<RefreshOutcome> {
        self.inner.refresh(Trigger::Manual).await
    }

    /// Creates a prompt.
    ///
    /// The prompt is visible and cached when this returns; the remote write
    /// continues in the background and its failure does not undo the local
    /// change.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for an invalid draft,
    /// [`SyncError::NotStarted`] before the cache has been loaded, and
    /// [`SyncError::Cache`] when the cache write fails. None of these leave
    /// any trace in memory or in the cache.
    pub async fn create(&self, draft: PromptDraft) -> SyncResult<Mutation> {
        self.inner.ensure_open()?;
        draft.validate()?;

        let prompt = {
            let mut local = self.inner.local.lock().await;
            if local.machine.state() == SyncState::Uninitialized {
                return Err(SyncError::NotStarted);
            }
            let prompt = Prompt::create(PromptId::next(local.prompts.latest_id()), draft)?;
            let mut next = local.prompts.clone();
            next.prepend(prompt.clone());
            self.inner.cache.write(&next).await?;
            local.prompts = next;
            prompt
        };

        info!(prompt_id = %prompt.id(), name = prompt.name(), "prompt created");
        let propagation = self
            .inner
            .spawn_propagation(ChangeKind::Create, prompt.clone());
        Ok(Mutation {
            prompt,
            propagation,
        })
    }

    /// Deletes a prompt, locally first and then remotely in the background.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] when no such prompt is loaded,
    /// [`SyncError::NotStarted`] before the cache has been loaded, and
    /// [`SyncError::Cache`] when the cache write fails.
    pub async fn delete(&self, id: PromptId) -> SyncResult<Mutation> {
        self.inner.ensure_open()?;

        let prompt = {
            let mut local = self.inner.local.lock().await;
            if local.machine.state() == SyncState::Uninitialized {
                return Err(SyncError::NotStarted);
            }
            let mut next = local.prompts.clone();
            let removed = next.remove(id).ok_or(SyncError::NotFound(id))?;
            self.inner.cache.write(&next).await?;
            local.prompts = next;
            local.pending_deletes.insert(id);
            removed
        };

        info!(prompt_id = %id, "prompt deleted");
        let propagation = self
            .inner
            .spawn_propagation(ChangeKind::Delete, prompt.clone());
        Ok(Mutation {
            prompt,
            propagation,
        })
    }

    /// Hands a prompt's text to the configured injector.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InjectorUnavailable`] without an injector and
    /// [`SyncError::NotFound`] for an unknown identity.
    pub async fn insert(&self, id: PromptId) -> SyncResult<InjectionOutcome> {
        let injector = self.injector()?;
        let text = self
            .get(id)
            .await
            .map(|prompt| prompt.text().to_owned())
            .ok_or(SyncError::NotFound(id))?;

        let outcome = injector.insert(&text).await;
        info!(
            prompt_id = %id,
            success = outcome.success(),
            method = outcome.method(),
            "prompt text injected"
        );
        self.inner.notify(SyncNotice::Injected {
            id,
            success: outcome.success(),
            method: outcome.method().to_owned(),
        });
        Ok(outcome)
    }

    /// Stores a prompt's text in the cache for a later
    /// [`SyncSession::deliver_pending_insert`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] or [`SyncError::Cache`].
    pub async fn queue_insert(&self, id: PromptId) -> SyncResult<()> {
        let prompt = self.get(id).await.ok_or(SyncError::NotFound(id))?;
        self.inner.cache.stash_pending_insert(prompt.text()).await?;
        debug!(prompt_id = %id, "insert queued");
        Ok(())
    }

    /// Injects and clears the queued insert, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InjectorUnavailable`] or [`SyncError::Cache`].
    pub async fn deliver_pending_insert(&self) -> SyncResult<Option<InjectionOutcome>> {
        let injector = self.injector()?;
        let Some(text) = self.inner.cache.take_pending_insert().await? else {
            return Ok(None);
        };
        let outcome = injector.insert(&text).await;
        info!(
            success = outcome.success(),
            method = outcome.method(),
            "queued text injected"
        );
        Ok(Some(outcome))
    }

    /// Starts background syncing.
    ///
    /// The worker wakes every check interval and refreshes once the
    /// configured sync interval has elapsed since the last successful sync.
    /// It stops when the handle is stopped or dropped, or when the session
    /// closes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotStarted`] before the cache has been loaded and
    /// [`SyncError::Closed`] after close.
    pub async fn start_periodic_sync(&self) -> SyncResult<PeriodicSync> {
        self.inner.ensure_open()?;
        if self.state().await == SyncState::Uninitialized {
            return Err(SyncError::NotStarted);
        }
        Ok(PeriodicSync::spawn(Arc::clone(&self.inner)))
    }

    /// Closes the session.
    ///
    /// New operations fail with [`SyncError::Closed`], queued remote writes
    /// are dropped, background syncing stops at its next wake-up, and
    /// results of in-flight fetches are discarded.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.writes.close();
        info!("sync session closed");
    }

    fn injector(&self) -> SyncResult<&Arc<dyn TextInjector>> {
        self.inner
            .injector
            .as_ref()
            .ok_or(SyncError::InjectorUnavailable)
    }
}

/// Builder for [`SyncSession`].
#[derive(Default)]
pub struct SyncSessionBuilder {
    cache: Option<Arc<dyn LocalCache>>,
    remote: Option<Arc<dyn RemoteStore>>,
    injector: Option<Arc<dyn TextInjector>>,
    sync_interval: Option<Duration>,
    check_interval: Option<Duration>,
    notice_capacity: Option<usize>,
}

impl fmt::Debug for SyncSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSessionBuilder")
            .field("cache", &self.cache.is_some())
            .field("remote", &self.remote.is_some())
            .field("injector", &self.injector.is_some())
            .field("sync_interval", &self.sync_interval)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

impl SyncSessionBuilder {
    /// Sets the local cache. Required.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn LocalCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the remote store. Required.
    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the text injector used by [`SyncSession::insert`].
    #[must_use]
    pub fn injector(mut self, injector: Arc<dyn TextInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Minimum time between background syncs. Defaults to five minutes.
    #[must_use]
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// How often the background worker checks whether a sync is due.
    /// Defaults to a quarter of the sync interval.
    #[must_use]
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Capacity of the notice channel. Defaults to 64.
    #[must_use]
    pub fn notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = Some(capacity);
        self
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when the cache or remote is
    /// missing or an interval is zero.
    pub fn build(self) -> SyncResult<SyncSession> {
        let cache = self
            .cache
            .ok_or(SyncError::Configuration("local cache is required"))?;
        let remote = self
            .remote
            .ok_or(SyncError::Configuration("remote store is required"))?;
        let sync_interval = self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL);
        if sync_interval.is_zero() {
            return Err(SyncError::Configuration(
                "sync interval must be greater than zero",
            ));
        }
        let check_interval = self.check_interval.unwrap_or(sync_interval / 4);
        if check_interval.is_zero() {
            return Err(SyncError::Configuration(
                "check interval must be greater than zero",
            ));
        }

        let capacity = self
            .notice_capacity
            .unwrap_or(DEFAULT_NOTICE_CAPACITY)
            .max(1);
        let (notices, _) = broadcast::channel(capacity);

        Ok(SyncSession {
            inner: Arc::new(SessionInner {
                cache,
                remote,
                injector: self.injector,
                local: Mutex::new(LocalState {
                    prompts: Collection::new(),
                    machine: SyncMachine::new(),
                    last_sync: None,
                    pending_deletes: HashSet::new(),
                }),
                remote_cycle: Mutex::new(()),
                refreshing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                notices,
                writes: WriteQueue::new(),
                sync_interval,
                check_interval,
            }),
        })
    }
}

//! Command-line shell over a prompt sync session.
//!
//! ```text
//! prompt-shell list
//! prompt-shell add <name> <text> [comma,separated,tags]
//! prompt-shell delete <id>
//! prompt-shell sync
//! prompt-shell insert <id>
//! ```
//!
//! Settings come from `promptsync.json` (optional) and `PROMPTSYNC_*`
//! variables; the bearer token is read from `PROMPTSYNC_TOKEN`.

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use prompt_cache::FileCache;
use prompt_config::{ConfigLoader, SyncConfig};
use prompt_primitives::{Collection, PromptDraft, PromptId, parse_tags};
use prompt_remote::client::{DocumentLocation, RemoteStoreClient};
use prompt_remote::drive::{DriveConfig, DriveService};
use prompt_remote::retry::RetryPolicy;
use prompt_remote::traits::StaticCredentials;
use prompt_sync::{InjectionOutcome, PropagationOutcome, SyncSession, SyncState, TextInjector};
use prompt_telemetry::{TelemetryConfig, init_tracing};
use tracing::warn;

const CONFIG_FILE: &str = "promptsync.json";

enum Command {
    List,
    Add {
        name: String,
        text: String,
        tags: Vec<String>,
    },
    Delete(PromptId),
    Sync,
    Insert(PromptId),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let id = |value: Option<&String>| -> Result<PromptId> {
            value
                .context("missing prompt id")?
                .parse()
                .context("prompt id must be an integer")
        };

        match args.first().map(String::as_str) {
            Some("list") | None => Ok(Self::List),
            Some("sync") => Ok(Self::Sync),
            Some("add") => {
                let name = args.get(1).context("missing prompt name")?.clone();
                let text = args.get(2).context("missing prompt text")?.clone();
                let tags = args.get(3).map(|raw| parse_tags(raw)).unwrap_or_default();
                Ok(Self::Add { name, text, tags })
            }
            Some("delete") => Ok(Self::Delete(id(args.get(1))?)),
            Some("insert") => Ok(Self::Insert(id(args.get(1))?)),
            Some(other) => bail!("unknown command `{other}` (expected list, add, delete, sync, insert)"),
        }
    }
}

/// Prints the prompt text; stands in for a clipboard or editor integration.
struct StdoutInjector;

#[async_trait]
impl TextInjector for StdoutInjector {
    async fn insert(&self, text: &str) -> InjectionOutcome {
        println!("{text}");
        InjectionOutcome::delivered("stdout")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::default())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    let config = ConfigLoader::new()
        .with_optional_file(CONFIG_FILE)?
        .with_env()?
        .load()?;

    let session = open_session(&config).await?;
    let result = run(&session, command).await;
    session.close();
    result
}

async fn open_session(config: &SyncConfig) -> Result<SyncSession> {
    let drive = DriveService::new(
        DriveConfig::new()
            .with_api_base_url(&config.api_base_url)?
            .with_upload_base_url(&config.upload_base_url)?
            .with_timeout(config.request_timeout()),
    )?;
    let attempts = NonZeroU32::new(config.retry_attempts).context("retry attempts must be non-zero")?;
    let remote = RemoteStoreClient::new(
        Arc::new(drive),
        Arc::new(StaticCredentials::from_env()),
        DocumentLocation::new(&config.container_name, &config.document_name)?,
    )
    .with_retry_policy(RetryPolicy::new(attempts, config.retry_base_delay()));
    let cache = FileCache::open(config.cache_path())
        .await
        .with_context(|| format!("opening cache {}", config.cache_path().display()))?;

    Ok(SyncSession::builder()
        .cache(Arc::new(cache))
        .remote(Arc::new(remote))
        .injector(Arc::new(StdoutInjector))
        .sync_interval(config.sync_interval())
        .build()?)
}

async fn run(session: &SyncSession, command: Command) -> Result<()> {
    match command {
        Command::List => {
            report_state(session.start().await?);
            print_prompts(&session.prompts().await);
        }
        Command::Sync => {
            let state = session.start().await?;
            report_state(state);
            println!("{} prompts, state {state:?}", session.prompts().await.len());
        }
        Command::Add { name, text, tags } => {
            session.load_cache().await?;
            let created = session
                .create(PromptDraft::new(name, text).with_tags(tags))
                .await?;
            println!("created {}", created.prompt().id());
            report_propagation(created.propagated().await);
        }
        Command::Delete(id) => {
            session.load_cache().await?;
            let removed = session.delete(id).await?;
            println!("deleted {} ({})", id, removed.prompt().name());
            report_propagation(removed.propagated().await);
        }
        Command::Insert(id) => {
            session.load_cache().await?;
            let outcome = session.insert(id).await?;
            if !outcome.success() {
                bail!("insert via {} failed", outcome.method());
            }
        }
    }
    Ok(())
}

fn print_prompts(prompts: &Collection) {
    if prompts.is_empty() {
        println!("no prompts");
        return;
    }
    for prompt in prompts {
        if prompt.tags().is_empty() {
            println!("{}  {}", prompt.id(), prompt.name());
        } else {
            println!("{}  {}  [{}]", prompt.id(), prompt.name(), prompt.tags().join(", "));
        }
    }
}

fn report_state(state: SyncState) {
    match state {
        SyncState::Degraded => warn!("remote sync failed; showing cached prompts"),
        SyncState::Failed => warn!("remote sync failed and no cached prompts are available"),
        _ => {}
    }
}

fn report_propagation(outcome: PropagationOutcome) {
    match outcome {
        PropagationOutcome::Written => println!("remote updated"),
        PropagationOutcome::Unchanged => println!("remote already up to date"),
        PropagationOutcome::Failed { kind, message } => {
            warn!(?kind, %message, "remote update failed; change kept locally");
        }
        PropagationOutcome::Skipped => warn!("remote update skipped"),
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Duration as TtlDuration;
use clap::{Parser, ValueEnum};

use doc_wallet_sync::documents::source::{
    FanOutSource, FileDocumentSource, MockDocumentSource, MockProfile,
};
use doc_wallet_sync::documents::types::DocTypeCode;
use doc_wallet_sync::persistence::STORE_PATH;
use doc_wallet_sync::{
    DocumentSource, DocumentStack, DocumentStore, DocumentsBundle, DocumentsLoader,
    DocumentsProcessor, JsonFileStore, MemoryStore, OrderingService, SourceError,
    StoredOrderingService,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(ValueEnum, Clone, Debug)]
enum SourceKind {
    Mock,
    File,
    Failing,
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = STORE_PATH)]
    store: PathBuf,

    /// Keep the cache in memory instead of the store file.
    #[arg(long)]
    memory: bool,

    #[arg(long, value_enum, default_value_t = SourceKind::Mock)]
    source: SourceKind,

    #[arg(long)]
    response_file: Option<PathBuf>,

    /// Number of refresh requests to fire at once.
    #[arg(long, default_value_t = 3)]
    refreshes: usize,

    #[arg(long, default_value_t = 24)]
    ttl_hours: i64,

    #[arg(long)]
    holder_name: Option<String>,

    /// DD.MM.YYYY
    #[arg(long)]
    birth_date: Option<String>,

    #[arg(long)]
    tax_id: Option<String>,
}

/// Source that never answers; exercises the failure paths from the CLI.
struct FailingSource;

#[async_trait]
impl DocumentSource for FailingSource {
    async fn fetch(&self, requested: &BTreeSet<DocTypeCode>) -> Result<DocumentsBundle, SourceError> {
        Err(SourceError::Transport(format!(
            "backend unavailable ({} types requested)",
            requested.len()
        )))
    }
}

#[derive(Debug)]
struct RunSummary {
    total_time: Duration,
    requests: usize,
    cycles: u64,
    notifications: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[MAIN] Source: {:?}", args.source);

    let store: Arc<dyn DocumentStore> = if args.memory {
        println!("[MAIN] Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let file_store = JsonFileStore::load_or_create(&args.store)
            .with_context(|| format!("opening store {}", args.store.display()))?;
        println!("[MAIN] Using store file {}", file_store.path().display());
        Arc::new(file_store)
    };
    let ordering: Arc<dyn OrderingService> = Arc::new(StoredOrderingService::new(store.clone()));
    let source = build_source(&args)?;

    let loader = DocumentsLoader::new(store.clone(), source, ordering.clone());
    let summary = run(&loader, args.refreshes).await;

    let processor = DocumentsProcessor::new(store, ordering);
    print_documents(&processor.current_documents());
    print_summary(&summary, &loader);

    Ok(())
}

fn build_source(args: &Args) -> Result<Arc<dyn DocumentSource>> {
    Ok(match args.source {
        SourceKind::Mock => {
            let mut profile = MockProfile {
                ttl: TtlDuration::hours(args.ttl_hours),
                ..MockProfile::default()
            };
            if let Some(name) = &args.holder_name {
                profile = profile.with_full_name(name);
            }
            if let Some(birth_date) = &args.birth_date {
                profile.birth_date = birth_date.clone();
            }
            if let Some(tax_id) = &args.tax_id {
                profile.tax_id = tax_id.clone();
            }
            let mock = MockDocumentSource::new(profile);
            println!("[MAIN] Mock holder: {}", mock.profile().full_name());
            Arc::new(FanOutSource::new(mock))
        }
        SourceKind::File => {
            let path = args
                .response_file
                .clone()
                .context("--response-file is required with --source file")?;
            println!("[MAIN] Reading responses from {}", path.display());
            Arc::new(FileDocumentSource::new(path))
        }
        SourceKind::Failing => Arc::new(FailingSource),
    })
}

async fn run(loader: &DocumentsLoader, refreshes: usize) -> RunSummary {
    let t0 = Instant::now();
    let notifications = Arc::new(AtomicU64::new(0));

    let id = loader.add_listener(Arc::new({
        let notifications = notifications.clone();
        move || {
            let n = notifications.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!("[MAIN] documents updated (#{}) after {:?}", n, t0.elapsed());
        }
    }));

    println!("[MAIN] Firing {} refresh requests...", refreshes);
    for _ in 0..refreshes {
        loader.request_refresh();
    }

    loader.wait_until_idle().await;
    loader.remove_listener(id);

    RunSummary {
        total_time: t0.elapsed(),
        requests: refreshes,
        cycles: loader.cycles_started(),
        notifications: notifications.load(Ordering::SeqCst),
    }
}

fn print_documents(stacks: &[DocumentStack]) {
    println!();
    println!("==================================================");
    println!("                    DOCUMENTS                     ");
    println!("==================================================");
    if stacks.is_empty() {
        println!("(no documents)");
    }
    for stack in stacks {
        for card in stack.cards() {
            println!("{:<22} | {:<14} | {}", card.title, card.doc_number, card.holder);
        }
    }
}

fn print_summary(s: &RunSummary, loader: &DocumentsLoader) {
    println!("--------------------------------------------------");
    println!("{:<22} | {:?}", "Total Time", s.total_time);
    println!("{:<22} | {}", "Refresh Requests", s.requests);
    println!("{:<22} | {}", "Cycles Started", s.cycles);
    println!("{:<22} | {}", "Notifications", s.notifications);
    println!(
        "{:<22} | {}",
        "Last Update",
        loader
            .last_update()
            .map(|t| t.to_rfc3339())
            .unwrap_or("-".into())
    );
    println!("==================================================");
}

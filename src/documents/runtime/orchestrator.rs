use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};

use crate::documents::engine::{EngineCommand, EngineEvent, Phase, RefreshCycle, RefreshEngine};
use crate::documents::freshness::{self, PlanAction};
use crate::documents::merge::{self, MergeReport};
use crate::documents::ordering::OrderingService;
use crate::documents::runtime::listeners::{
    panic_message, spawn_notifier, DocumentsListener, ListenerId, ListenerTable, NotifierMsg,
};
use crate::documents::source::{DocumentSource, SourceError};
use crate::documents::types::DocTypeCode;
use crate::persistence::{DocumentStore, DocumentStoreExt, StoringKey};

struct Shared {
    engine: Mutex<RefreshEngine>,
    phase_tx: watch::Sender<Phase>,

    store: Arc<dyn DocumentStore>,
    source: Arc<dyn DocumentSource>,
    ordering: Arc<dyn OrderingService>,

    listeners: Arc<Mutex<ListenerTable>>,
    notifier: mpsc::UnboundedSender<NotifierMsg>,

    runtime: Handle,
    t0: Instant,
}

/// **DocumentsLoader**
///
/// Imperative shell around [`RefreshEngine`]. It:
/// 1. Turns caller requests into engine events.
/// 2. Runs each cycle the engine starts: plan, fetch, merge.
/// 3. Hands "documents were updated" to the notification context.
///
/// Cheap to clone; every clone drives the same engine. Callable from any
/// thread.
#[derive(Clone)]
pub struct DocumentsLoader {
    shared: Arc<Shared>,
}

impl DocumentsLoader {
    /// Builds a loader on the current Tokio runtime.
    ///
    /// # Panics
    /// When called outside a Tokio runtime.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn DocumentSource>,
        ordering: Arc<dyn OrderingService>,
    ) -> Self {
        Self::with_runtime(Handle::current(), store, source, ordering)
    }

    pub fn with_runtime(
        runtime: Handle,
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn DocumentSource>,
        ordering: Arc<dyn OrderingService>,
    ) -> Self {
        let listeners = Arc::new(Mutex::new(ListenerTable::default()));
        let notifier = spawn_notifier(&runtime, listeners.clone());
        let (phase_tx, _) = watch::channel(Phase::Idle);

        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(RefreshEngine::new()),
                phase_tx,
                store,
                source,
                ordering,
                listeners,
                notifier,
                runtime,
                t0: Instant::now(),
            }),
        }
    }

    /// Fire-and-forget. Starts a cycle when idle; while a cycle is in
    /// flight, schedules exactly one follow-up no matter how often it is
    /// called.
    pub fn request_refresh(&self) {
        self.trace("request_refresh");
        self.dispatch(EngineEvent::RefreshRequested);
    }

    /// Registers a listener and cold-starts the cache when nothing tracked
    /// is stored yet (deferring to a cycle already in flight).
    pub fn add_listener(&self, listener: Arc<dyn DocumentsListener>) -> ListenerId {
        let id = self.lock_listeners().insert(listener);
        self.debug(&format!("listener {:?} added", id));

        let cache_populated = freshness::has_any_tracked(&*self.shared.store);

        let mut engine = self.lock_engine();
        // A running cycle may be writing the order hint; seed only while idle.
        if cache_populated && engine.phase() == Phase::Idle {
            let (_, unusable) = freshness::effective_order(&self.shared.ordering.doc_types_order());
            if unusable {
                self.info("seeding default document order");
                self.shared.ordering.set_order(default_order_codes(), false);
            }
        }

        self.dispatch_locked(&mut engine, EngineEvent::ListenerAdded { cache_populated });
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.lock_listeners().remove(id);
        self.debug(&format!("listener {:?} removed={}", id, removed));
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    pub fn phase(&self) -> Phase {
        *self.shared.phase_tx.borrow()
    }

    pub fn cycles_started(&self) -> u64 {
        self.lock_engine().cycles_started()
    }

    pub fn last_cycle(&self) -> Option<RefreshCycle> {
        self.lock_engine().last_cycle().cloned()
    }

    /// Timestamp of the last successful source call.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        let raw: String = self.shared.store.get_value(StoringKey::LastDocumentUpdate)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .ok()
    }

    /// Resolves once the loader is idle and every notification queued so
    /// far has been delivered.
    pub async fn wait_until_idle(&self) {
        let mut phase = self.shared.phase_tx.subscribe();
        if phase.wait_for(|p| *p == Phase::Idle).await.is_err() {
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        if self.shared.notifier.send(NotifierMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Feeds an event into the engine and executes the resulting commands.
    ///
    /// Commands run under the engine lock; none of them blocks, and the
    /// phase is published only after they ran, so a notification is always
    /// queued before the matching `Idle` becomes visible.
    fn dispatch(&self, event: EngineEvent) {
        let mut engine = self.lock_engine();
        self.dispatch_locked(&mut engine, event);
    }

    fn dispatch_locked(&self, engine: &mut RefreshEngine, event: EngineEvent) {
        self.trace(&format!("engine.handle_event({:?})", event));

        let cmds = engine.handle_event(event);
        for cmd in cmds {
            self.execute_command(cmd);
        }

        self.shared.phase_tx.send_replace(engine.phase());
    }

    fn execute_command(&self, cmd: EngineCommand) {
        self.trace(&format!("cmd: {:?}", cmd));
        match cmd {
            EngineCommand::StartCycle => {
                let this = self.clone();
                self.shared.runtime.spawn(async move {
                    // A panicking cycle still settles the engine.
                    let cycle = match AssertUnwindSafe(this.run_cycle()).catch_unwind().await {
                        Ok(cycle) => cycle,
                        Err(payload) => {
                            log::error!(
                                "[LOADER] cycle panicked: {}",
                                panic_message(payload.as_ref())
                            );
                            RefreshCycle::default()
                        }
                    };
                    this.dispatch(EngineEvent::CycleSettled(cycle));
                });
            }
            EngineCommand::NotifyListeners => {
                if self.shared.notifier.send(NotifierMsg::Notify).is_err() {
                    log::warn!("[LOADER] notifier is gone, dropping notification");
                }
            }
            EngineCommand::EnterIdle => {
                self.debug("idle");
            }
        }
    }

    async fn run_cycle(&self) -> RefreshCycle {
        let store = &*self.shared.store;
        let now = Utc::now();

        let raw_order = self.shared.ordering.doc_types_order();
        let plan = freshness::plan_cycle(&raw_order, store, now);
        if plan.used_default_order {
            self.shared.ordering.set_order(default_order_codes(), false);
        }

        let mut cycle = RefreshCycle {
            stale_set: plan.stale_set(),
            cold_start: !freshness::has_any_tracked(store),
            produced_changes: false,
        };
        self.info(&format!(
            "cycle start: {:?} over {:?} (cold_start={}, irrelevant={:?})",
            plan.action, plan.order, cycle.cold_start, plan.irrelevant
        ));

        match plan.action {
            PlanAction::UpToDate => {
                // Nothing to fetch; still let consumers pick up out-of-band changes.
                cycle.produced_changes = true;
            }
            PlanAction::ColdStart => match self.fetch_and_merge(&BTreeSet::new()).await {
                Ok(_) => cycle.produced_changes = true,
                Err(e) => log::warn!("[LOADER] cold start fetch failed: {}", e),
            },
            PlanAction::Fetch(types) => match self.fetch_and_merge(&types).await {
                Ok(_) => cycle.produced_changes = true,
                Err(e) => {
                    log::warn!("[LOADER] fetch of {:?} failed: {}", types, e);
                    cycle.produced_changes = self.recover_from_failure().await;
                }
            },
        }

        self.info(&format!("cycle settled (changes={})", cycle.produced_changes));
        cycle
    }

    /// After a failed fetch: keep whatever is cached, or, with nothing
    /// cached at all, try the full default set once.
    async fn recover_from_failure(&self) -> bool {
        if freshness::has_any_tracked(&*self.shared.store) {
            self.info("keeping cached documents");
            return false;
        }

        self.info("nothing cached, falling back to the default set");
        match self.fetch_and_merge(&BTreeSet::new()).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("[LOADER] fallback fetch failed, giving up until next refresh: {}", e);
                false
            }
        }
    }

    async fn fetch_and_merge(&self, requested: &BTreeSet<DocTypeCode>) -> Result<MergeReport, SourceError> {
        self.debug(&format!("fetching {:?}", requested));
        let bundle = self.shared.source.fetch(requested).await?;

        let report = merge::apply_bundle(
            &*self.shared.store,
            &*self.shared.ordering,
            bundle,
            Utc::now(),
        );
        self.debug(&format!("merged {:?}", report));
        Ok(report)
    }

    fn lock_engine(&self) -> MutexGuard<'_, RefreshEngine> {
        self.shared.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, ListenerTable> {
        self.shared.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn t(&self) -> u128 {
        self.shared.t0.elapsed().as_micros()
    }

    fn info(&self, msg: &str) {
        log::info!("[LOADER] {:>8}us: {}", self.t(), msg);
    }

    fn debug(&self, msg: &str) {
        log::debug!("[LOADER] {:>8}us: {}", self.t(), msg);
    }

    fn trace(&self, msg: &str) {
        log::trace!("[LOADER] {:>8}us: {}", self.t(), msg);
    }
}

fn default_order_codes() -> Vec<String> {
    DocTypeCode::DEFAULT_ORDER
        .iter()
        .map(|t| t.code().to_string())
        .collect()
}

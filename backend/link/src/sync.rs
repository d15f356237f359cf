//! # Synchronizer
//!
//! Owns the [`QueryState`] of one list view and keeps its envelope in step
//! with the server.
//!
//!
//!
//! ## Requests
//! - Every setter replaces one slice of the state and schedules exactly one fetch
//! - Search is debounced, every other setter fetches immediately and drops a
//!   pending debounced search (its text is already part of the new state)
//! - Setting a slice to its current value does nothing
//! - [`Synchronizer::refetch`] joins the in-flight request when it already
//!   carries the same parameters
//!
//!
//!
//! ## Responses
//! - Each request takes the next sequence number; only the highest one issued
//!   may touch the view, anything older resolves as [`Resolution::Stale`]
//! - A page past the end (filters or deletions shrank the set) clamps the page
//!   index to the last page and issues one corrective fetch, the out of range
//!   envelope is never shown
//! - An empty set resets the page index to `0` and is shown as is
//! - A failure keeps the last good envelope and fills the error slot instead
//!
//!
//!
//! ## Observation
//! Views either poll [`Synchronizer::snapshot`] or `subscribe` to a watch
//! channel that is updated on every change. Dropping the synchronizer aborts
//! its pending and in-flight fetches.
//!
//! Setters spawn onto the current tokio runtime and must be called from
//! within one.
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use protocol::{
    Collection, CollectionEnvelope, ColumnFilters, EncodingError, QueryParams, QueryState,
    SortSpec, encode,
};
use tokio::{sync::watch, task::AbortHandle, time::sleep};
use tracing::{debug, warn};

use crate::{
    config::SyncConfig,
    error::{ConfigError, FetchError},
    source::CollectionSource,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
}

/// What became of a response once it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Failed,
    /// Superseded by a newer request and discarded.
    Stale,
    /// Past the last page; refetching `page_index` instead.
    Corrected { page_index: u32 },
}

#[derive(Debug, Clone)]
pub struct ViewState<R> {
    pub query: QueryState,
    /// Last envelope that was applied, kept through failures.
    pub envelope: Option<CollectionEnvelope<R>>,
    pub error: Option<FetchError>,
    pub phase: Phase,
    pub last_resolution: Option<Resolution>,
}

impl<R> ViewState<R> {
    fn new(query: QueryState) -> Self {
        Self {
            query,
            envelope: None,
            error: None,
            phase: Phase::Idle,
            last_resolution: None,
        }
    }

    pub fn loading(&self) -> bool {
        self.phase == Phase::Loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schedule {
    Now,
    Debounced,
}

/// The newest request issued, until it resolves.
struct Pending {
    sequence: u64,
    params: QueryParams,
    schedule: Schedule,
    task: AbortHandle,
}

struct Core<R> {
    view: ViewState<R>,
    issued: u64,
    latest: Option<Pending>,
    tasks: Vec<AbortHandle>,
}

struct Shared<R> {
    source: Arc<dyn CollectionSource<R>>,
    collection: Collection,
    search_debounce: Duration,
    core: Mutex<Core<R>>,
    updates: watch::Sender<ViewState<R>>,
}

pub struct Synchronizer<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Core<R>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R> Shared<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn publish(&self, core: &Core<R>) {
        self.updates.send_replace(core.view.clone());
    }

    fn issue(self: &Arc<Self>, core: &mut Core<R>, params: QueryParams, schedule: Schedule) {
        if let Some(pending) = &core.latest {
            if pending.schedule == Schedule::Debounced {
                pending.task.abort();
            }
        }

        core.issued += 1;
        let sequence = core.issued;

        let delay = match schedule {
            Schedule::Now => None,
            Schedule::Debounced => Some(self.search_debounce),
        };
        let source = Arc::clone(&self.source);
        let shared = Arc::downgrade(self);
        let request = params.clone();

        let task = tokio::spawn(async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }

            let outcome = source.fetch(request).await;

            if let Some(shared) = shared.upgrade() {
                shared.resolve(sequence, outcome);
            }
        })
        .abort_handle();

        core.tasks.retain(|task| !task.is_finished());
        core.tasks.push(task.clone());
        core.latest = Some(Pending {
            sequence,
            params,
            schedule,
            task,
        });
        core.view.phase = Phase::Loading;
    }

    fn resolve(self: &Arc<Self>, sequence: u64, outcome: Result<CollectionEnvelope<R>, FetchError>) {
        let mut core = self.lock();

        let resolution = if sequence != core.issued {
            debug!(
                "Discarding stale {} response #{sequence}, latest is #{}",
                self.collection, core.issued
            );
            Resolution::Stale
        } else {
            core.latest = None;

            match outcome {
                Ok(envelope) => self.apply(&mut core, envelope),
                Err(error) => {
                    warn!("Fetching {} failed: {error}", self.collection);
                    core.view.error = Some(error);
                    Resolution::Failed
                }
            }
        };

        if core.latest.is_none() {
            core.view.phase = Phase::Idle;
        }
        core.view.last_resolution = Some(resolution);

        self.publish(&core);
    }

    fn apply(self: &Arc<Self>, core: &mut Core<R>, envelope: CollectionEnvelope<R>) -> Resolution {
        let page_count = envelope.page_count;
        let page_index = core.view.query.page_index;

        if page_count > 0 && u64::from(page_index) >= page_count {
            let last = u32::try_from(page_count - 1).unwrap_or(page_index);
            debug!(
                "Page {page_index} of {} is past the last page, correcting to {last}",
                self.collection
            );

            core.view.query.page_index = last;

            return match encode(&core.view.query, self.collection) {
                Ok(params) => {
                    self.issue(core, params, Schedule::Now);
                    Resolution::Corrected { page_index: last }
                }
                Err(e) => {
                    core.view.error = Some(FetchError::Execution(e.to_string()));
                    Resolution::Failed
                }
            };
        }

        if page_count == 0 {
            core.view.query.page_index = 0;
        }

        core.view.envelope = Some(envelope);
        core.view.error = None;

        Resolution::Applied
    }
}

impl<R> Synchronizer<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// A view in the initial idle state with no envelope. Nothing is fetched
    /// until a setter or [`Synchronizer::refetch`] is called.
    pub fn new(
        source: impl CollectionSource<R> + 'static,
        collection: Collection,
        config: SyncConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let view = ViewState::new(QueryState::with_page_size(config.page_size));
        let (updates, _) = watch::channel(view.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                source: Arc::new(source),
                collection,
                search_debounce: config.search_debounce,
                core: Mutex::new(Core {
                    view,
                    issued: 0,
                    latest: None,
                    tasks: Vec::new(),
                }),
                updates,
            }),
        })
    }

    pub fn collection(&self) -> Collection {
        self.shared.collection
    }

    pub fn snapshot(&self) -> ViewState<R> {
        self.shared.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<R>> {
        self.shared.updates.subscribe()
    }

    /// Waits until nothing is scheduled or in flight.
    pub async fn settled(&self) -> ViewState<R> {
        let mut updates = self.subscribe();

        // Bound to a local so the watch guard is released before `updates`.
        #[allow(clippy::let_and_return)]
        let view = match updates.wait_for(|view| !view.loading()).await {
            Ok(view) => (*view).clone(),
            Err(_) => self.snapshot(),
        };
        view
    }

    pub fn set_page_index(&self, page_index: u32) -> Result<(), EncodingError> {
        self.update(Schedule::Now, |query| query.page_index = page_index)
    }

    pub fn set_page_size(&self, page_size: u32) -> Result<(), EncodingError> {
        self.update(Schedule::Now, |query| query.page_size = page_size)
    }

    pub fn set_sorting(&self, sort: Vec<SortSpec>) -> Result<(), EncodingError> {
        self.update(Schedule::Now, |query| query.sort = sort)
    }

    pub fn set_column_filters(&self, filters: ColumnFilters) -> Result<(), EncodingError> {
        self.update(Schedule::Now, |query| query.column_filters = filters)
    }

    pub fn set_search_value(&self, search: impl Into<String>) -> Result<(), EncodingError> {
        let search = search.into();
        self.update(Schedule::Debounced, |query| query.search_value = search)
    }

    /// Fetches the current state again, typically after a mutation elsewhere.
    pub fn refetch(&self) -> Result<(), EncodingError> {
        let shared = &self.shared;
        let mut core = shared.lock();

        let params = encode(&core.view.query, shared.collection)?;

        if let Some(pending) = &core.latest {
            if pending.params == params {
                debug!(
                    "Joining pending {} request #{}",
                    shared.collection, pending.sequence
                );
                return Ok(());
            }
        }

        shared.issue(&mut core, params, Schedule::Now);
        shared.publish(&core);

        Ok(())
    }

    /// Validates the changed state before committing it, so a rejected
    /// change leaves the view untouched.
    fn update(
        &self,
        schedule: Schedule,
        change: impl FnOnce(&mut QueryState),
    ) -> Result<(), EncodingError> {
        let shared = &self.shared;
        let mut core = shared.lock();

        let mut query = core.view.query.clone();
        change(&mut query);

        if query == core.view.query {
            return Ok(());
        }

        let params = encode(&query, shared.collection)?;
        core.view.query = query;

        shared.issue(&mut core, params, schedule);
        shared.publish(&core);

        Ok(())
    }
}

impl<R> Drop for Synchronizer<R> {
    fn drop(&mut self) {
        for task in &self.shared.lock().tasks {
            task.abort();
        }
    }
}

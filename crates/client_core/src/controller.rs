//! Filter/sort/pagination state for one resource collection.
//!
//! Every state-changing call issues its own fetch. Fetches are stamped with
//! a sequence number and only the most recently issued one may write its
//! result back, so a slow response for a superseded query is dropped instead
//! of overwriting newer state.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use shared::{
    domain::{Resource, ResourceId},
    protocol::{PageResult, Query, SortOrder, DEFAULT_PAGE_LIMIT},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ControllerError, DeleteFailure, MutationKind, TransportError},
    filters::FilterSet,
    selection::Selection,
    transport::{ResourceApi, ResourceBody},
};

const EVENT_CAPACITY: usize = 256;
/// Extra fetches allowed when a result shows the current page no longer exists.
const MAX_CLAMP_FOLLOW_UPS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPhase {
    #[default]
    Idle,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Loaded {
        page: u32,
        total_pages: u32,
        total_count: u64,
    },
    LoadFailed(String),
    SelectionChanged {
        selected: usize,
    },
    Mutated {
        action: MutationKind,
        id: ResourceId,
    },
}

/// Everything a view needs to render the list.
#[derive(Debug, Clone)]
pub struct ListSnapshot<R> {
    pub query: Query,
    pub staged_filters: BTreeMap<String, String>,
    pub page: PageResult<R>,
    pub selection: Vec<ResourceId>,
    pub phase: FetchPhase,
    pub error: Option<ControllerError>,
    pub mutation_error: Option<ControllerError>,
    pub loaded_at: Option<DateTime<Utc>>,
}

struct ListState<R> {
    query: Query,
    staged: FilterSet,
    page: PageResult<R>,
    selection: Selection,
    phase: FetchPhase,
    error: Option<ControllerError>,
    mutation_error: Option<ControllerError>,
    loaded_at: Option<DateTime<Utc>>,
    issued_seq: u64,
}

impl<R: Resource> ListState<R> {
    fn new(mut query: Query) -> Self {
        query.page = query.page.max(1);
        if query.limit == 0 {
            query.limit = DEFAULT_PAGE_LIMIT;
        }
        let mut staged = FilterSet::default();
        staged.stage(&query.filters);
        Self {
            query,
            staged,
            page: PageResult::default(),
            selection: Selection::default(),
            phase: FetchPhase::Idle,
            error: None,
            mutation_error: None,
            loaded_at: None,
            issued_seq: 0,
        }
    }

    fn begin_fetch(&mut self) -> (u64, Query) {
        self.issued_seq += 1;
        self.phase = FetchPhase::Loading;
        (self.issued_seq, self.query.clone())
    }

    fn is_loaded(&self, id: &ResourceId) -> bool {
        self.page.items.iter().any(|item| item.id() == id)
    }
}

pub struct ListController<A: ResourceApi> {
    api: A,
    inner: Mutex<ListState<A::Item>>,
    events: broadcast::Sender<ListEvent>,
}

impl<A: ResourceApi> ListController<A> {
    pub fn new(api: A) -> Arc<Self> {
        Self::with_query(api, Query::default())
    }

    /// Starts from `query` instead of the defaults. Its filters also become
    /// the staged filters.
    pub fn with_query(api: A, query: Query) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            api,
            inner: Mutex::new(ListState::new(query)),
            events,
        })
    }

    pub fn resource(&self) -> &str {
        self.api.resource()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ListSnapshot<A::Item> {
        let state = self.inner.lock().await;
        ListSnapshot {
            query: state.query.clone(),
            staged_filters: state.staged.to_map(),
            page: state.page.clone(),
            selection: state.selection.ids(),
            phase: state.phase,
            error: state.error.clone(),
            mutation_error: state.mutation_error.clone(),
            loaded_at: state.loaded_at,
        }
    }

    /// First fetch after the screen is mounted.
    pub async fn load(&self) -> Result<(), ControllerError> {
        info!(resource = self.resource(), "loading list");
        self.fetch_with(|_| true).await
    }

    /// Re-issues the current query as-is.
    pub async fn refresh(&self) -> Result<(), ControllerError> {
        self.fetch_with(|_| true).await
    }

    /// Stages filter values without fetching; see [`ListController::apply_filters`].
    pub async fn set_filter<I, K, V>(&self, partial: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut state = self.inner.lock().await;
        state.staged.stage(partial);
    }

    pub async fn apply_filters(&self) -> Result<(), ControllerError> {
        self.fetch_with(|state| {
            state.query.filters = state.staged.to_map();
            state.query.page = 1;
            true
        })
        .await
    }

    pub async fn reset_filters(&self) -> Result<(), ControllerError> {
        self.fetch_with(|state| {
            state.staged.clear();
            state.query.filters.clear();
            state.query.page = 1;
            true
        })
        .await
    }

    /// Sorting by a different field starts over from page 1; flipping the
    /// order of the current field keeps the page.
    pub async fn set_sort(&self, field: &str, order: SortOrder) -> Result<(), ControllerError> {
        let field = field.trim().to_string();
        if field.is_empty() {
            return Ok(());
        }
        self.fetch_with(move |state| {
            if state.query.sort_by != field {
                state.query.page = 1;
            }
            state.query.sort_by = field;
            state.query.sort_order = order;
            true
        })
        .await
    }

    pub async fn set_limit(&self, limit: u32) -> Result<(), ControllerError> {
        if limit == 0 {
            return Ok(());
        }
        self.fetch_with(move |state| {
            state.query.limit = limit;
            state.query.page = 1;
            true
        })
        .await
    }

    /// Ignored unless `1 <= page <= total_pages` of the loaded result.
    pub async fn set_page(&self, page: u32) -> Result<(), ControllerError> {
        let events = self.events.clone();
        self.fetch_with(move |state| {
            if page < 1 || page > state.page.total_pages {
                debug!(page, total_pages = state.page.total_pages, "page out of range");
                return false;
            }
            state.query.page = page;
            if state.selection.clear() {
                let _ = events.send(ListEvent::SelectionChanged { selected: 0 });
            }
            true
        })
        .await
    }

    /// Rows that are not on the loaded page cannot be selected.
    pub async fn toggle_select(&self, id: &ResourceId) -> bool {
        let mut state = self.inner.lock().await;
        if !state.is_loaded(id) {
            debug!(resource = self.resource(), %id, "ignoring selection of unloaded row");
            return false;
        }
        let selected = state.selection.toggle(id);
        self.notify_selection(state.selection.len());
        selected
    }

    /// Selects every row of the loaded page, never rows on other pages.
    pub async fn select_all(&self) -> usize {
        let mut state = self.inner.lock().await;
        let ListState {
            page, selection, ..
        } = &mut *state;
        selection.replace(page.items.iter().map(Resource::id));
        let selected = selection.len();
        self.notify_selection(selected);
        selected
    }

    pub async fn clear_selection(&self) {
        let mut state = self.inner.lock().await;
        if state.selection.clear() {
            self.notify_selection(0);
        }
    }

    pub async fn selected_ids(&self) -> Vec<ResourceId> {
        self.inner.lock().await.selection.ids()
    }

    pub async fn remove(&self, id: &ResourceId) -> Result<(), ControllerError> {
        let (_, failures) = self.delete_then_refresh(std::slice::from_ref(id)).await;
        match failures.into_iter().next() {
            None => {
                self.clear_mutation_error().await;
                Ok(())
            }
            Some(failure) => {
                let error = ControllerError::Mutation {
                    resource: self.resource().to_string(),
                    action: MutationKind::Delete,
                    message: failure.message,
                };
                self.record_mutation_error(&error).await;
                Err(error)
            }
        }
    }

    /// Deletes every id concurrently. A failure does not undo the deletes
    /// that went through; the error lists the ids that failed.
    pub async fn remove_many(&self, ids: &[ResourceId]) -> Result<Vec<ResourceId>, ControllerError> {
        let mut unique: Vec<ResourceId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let (deleted, failures) = self.delete_then_refresh(&unique).await;
        if failures.is_empty() {
            self.clear_mutation_error().await;
            return Ok(deleted);
        }

        let error = ControllerError::BulkDelete {
            resource: self.resource().to_string(),
            deleted,
            failures,
        };
        self.record_mutation_error(&error).await;
        Err(error)
    }

    pub async fn remove_selected(&self) -> Result<Vec<ResourceId>, ControllerError> {
        let ids = self.selected_ids().await;
        self.remove_many(&ids).await
    }

    pub async fn create(&self, body: ResourceBody) -> Result<A::Item, ControllerError> {
        let created = match self.api.create(body).await {
            Ok(created) => created,
            Err(err) => return Err(self.mutation_failed(MutationKind::Create, err).await),
        };
        info!(resource = self.resource(), id = %created.id(), "created");
        self.clear_mutation_error().await;
        let _ = self.events.send(ListEvent::Mutated {
            action: MutationKind::Create,
            id: created.id().clone(),
        });
        self.refresh_after_mutation().await;
        Ok(created)
    }

    pub async fn update(
        &self,
        id: &ResourceId,
        body: ResourceBody,
    ) -> Result<A::Item, ControllerError> {
        let updated = match self.api.update(id, body).await {
            Ok(updated) => updated,
            Err(err) => return Err(self.mutation_failed(MutationKind::Update, err).await),
        };
        info!(resource = self.resource(), %id, "updated");
        {
            let mut state = self.inner.lock().await;
            if let Some(row) = state.page.items.iter_mut().find(|row| row.id() == id) {
                *row = updated.clone();
            }
            state.mutation_error = None;
        }
        let _ = self.events.send(ListEvent::Mutated {
            action: MutationKind::Update,
            id: id.clone(),
        });
        self.refresh_after_mutation().await;
        Ok(updated)
    }

    async fn fetch_with<F>(&self, prepare: F) -> Result<(), ControllerError>
    where
        F: FnOnce(&mut ListState<A::Item>) -> bool,
    {
        let (mut seq, mut query) = {
            let mut state = self.inner.lock().await;
            if !prepare(&mut *state) {
                return Ok(());
            }
            state.begin_fetch()
        };
        let mut follow_ups = 0;

        loop {
            debug!(resource = self.resource(), seq, page = query.page, "fetching list");
            let result = self.api.list(&query).await;

            let mut state = self.inner.lock().await;
            if seq != state.issued_seq {
                debug!(
                    resource = self.resource(),
                    seq,
                    latest = state.issued_seq,
                    "discarding stale list response"
                );
                return Ok(());
            }
            state.phase = FetchPhase::Idle;

            let page = match result {
                Ok(page) => page,
                Err(err) => {
                    warn!(resource = self.resource(), seq, error = %err, "list fetch failed");
                    let error = ControllerError::Fetch {
                        resource: self.resource().to_string(),
                        message: err.message(),
                    };
                    state.error = Some(error.clone());
                    let _ = self.events.send(ListEvent::LoadFailed(error.message()));
                    return Err(error);
                }
            };

            let total_pages = page.total_pages;
            let total_count = page.total_count;
            state.page = page;
            state.error = None;
            state.loaded_at = Some(Utc::now());
            if state.selection.clear() {
                self.notify_selection(0);
            }

            if total_pages == 0 && state.query.page > 1 {
                info!(
                    resource = self.resource(),
                    page = state.query.page,
                    "collection is empty, back to first page"
                );
                state.query.page = 1;
            } else if total_pages >= 1 && state.query.page > total_pages {
                if follow_ups < MAX_CLAMP_FOLLOW_UPS {
                    info!(
                        resource = self.resource(),
                        page = state.query.page,
                        total_pages,
                        "page past the end, clamping"
                    );
                    follow_ups += 1;
                    state.query.page = total_pages;
                    (seq, query) = state.begin_fetch();
                    continue;
                }
                // The loaded rows still belong to the requested page.
                warn!(
                    resource = self.resource(),
                    page = state.query.page,
                    total_pages,
                    "page still past the end after re-fetching"
                );
            }

            info!(
                resource = self.resource(),
                page = state.query.page,
                total_pages,
                total_count,
                "list loaded"
            );
            let _ = self.events.send(ListEvent::Loaded {
                page: state.query.page,
                total_pages,
                total_count,
            });
            return Ok(());
        }
    }

    async fn delete_then_refresh(
        &self,
        ids: &[ResourceId],
    ) -> (Vec<ResourceId>, Vec<DeleteFailure>) {
        let outcomes = join_all(
            ids.iter()
                .map(|id| async move { (id, self.api.delete(id).await) }),
        )
        .await;

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    info!(resource = self.resource(), %id, "deleted");
                    let _ = self.events.send(ListEvent::Mutated {
                        action: MutationKind::Delete,
                        id: id.clone(),
                    });
                    deleted.push(id.clone());
                }
                Err(err) => {
                    warn!(resource = self.resource(), %id, error = %err, "delete failed");
                    failures.push(DeleteFailure {
                        id: id.clone(),
                        message: err.message(),
                    });
                }
            }
        }

        self.clear_selection().await;
        self.refresh_after_mutation().await;
        (deleted, failures)
    }

    async fn refresh_after_mutation(&self) {
        if let Err(err) = self.refresh().await {
            warn!(resource = self.resource(), error = %err, "refresh after mutation failed");
        }
    }

    async fn mutation_failed(&self, action: MutationKind, err: TransportError) -> ControllerError {
        warn!(resource = self.resource(), %action, error = %err, "mutation failed");
        let error = ControllerError::Mutation {
            resource: self.resource().to_string(),
            action,
            message: err.message(),
        };
        self.record_mutation_error(&error).await;
        error
    }

    async fn record_mutation_error(&self, error: &ControllerError) {
        self.inner.lock().await.mutation_error = Some(error.clone());
    }

    async fn clear_mutation_error(&self) {
        self.inner.lock().await.mutation_error = None;
    }

    fn notify_selection(&self, selected: usize) {
        let _ = self.events.send(ListEvent::SelectionChanged { selected });
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

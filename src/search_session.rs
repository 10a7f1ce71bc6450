//! # Search Session Module
//!
//! State machine for incremental, cancel-safe paginated search. The session
//! owns the current query, page index, in-flight fetch, and the per-result
//! unit/quantity selection, and publishes a consistent snapshot through a
//! watch channel.
//!
//! ## Cancellation
//!
//! At most one fetch is outstanding at a time. Every fetch carries a
//! generation number; starting a new fetch bumps the generation, aborts the
//! old task, and publishes the loading state synchronously. A completing
//! fetch re-checks the generation under the session lock before writing, so
//! a cancelled fetch that slips past its abort point can still never
//! overwrite a newer fetch's outcome.

use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::FIRST_PAGE;
use crate::errors::ValidationError;
use crate::food_model::{FoodRecord, SearchPage};
use crate::remote::{fetch_food_page, FoodSource};
use crate::staging::StagedEntry;
use crate::validate::{parse_quantity, validate_quantity};

/// Three-state result exposed to consumers of a remote operation.
///
/// Consumers are expected to match exhaustively; there is no "partial"
/// state, and the error message is never empty.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResource<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> RemoteResource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, RemoteResource::Loading)
    }
}

/// Snapshot of everything the search surface renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchViewState {
    pub results: RemoteResource<Vec<FoodRecord>>,
    pub current_page: u32,
    pub has_next_page: bool,
    /// `None` means no item is selected.
    pub selected_item: Option<usize>,
    pub selected_unit: usize,
    pub quantity: f32,
    /// `[kcal, protein, carbs, fat]` for the active selection, empty when
    /// nothing usable is selected.
    pub display_stats: Vec<f32>,
}

impl Default for SearchViewState {
    fn default() -> Self {
        Self {
            results: RemoteResource::Success(Vec::new()),
            current_page: FIRST_PAGE,
            has_next_page: false,
            selected_item: None,
            selected_unit: 0,
            quantity: 1.0,
            display_stats: Vec::new(),
        }
    }
}

struct SessionInner {
    previous_query: Option<String>,
    generation: u64,
    fetch_task: Option<JoinHandle<()>>,
}

/// Cancel-safe search state machine over a [`FoodSource`].
pub struct SearchSession {
    source: Arc<dyn FoodSource>,
    state: Arc<watch::Sender<SearchViewState>>,
    inner: Arc<Mutex<SessionInner>>,
}

impl SearchSession {
    pub fn new(source: Arc<dyn FoodSource>) -> Self {
        let (state, _) = watch::channel(SearchViewState::default());
        Self {
            source,
            state: Arc::new(state),
            inner: Arc::new(Mutex::new(SessionInner {
                previous_query: None,
                generation: 0,
                fetch_task: None,
            })),
        }
    }

    /// Receiver delivering every published state snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SearchViewState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SearchViewState {
        self.state.borrow().clone()
    }

    /// Run a search. `None` reuses the last query; a fetch is issued only
    /// when the resolved query is non-blank and either `force` is set or
    /// the query differs from the previous one, so identical repeated
    /// non-forced searches are no-ops.
    ///
    /// The loading state is published synchronously, before the request
    /// resolves; any in-flight fetch is cancelled first.
    pub fn search(&self, query: Option<&str>, page: u32, force: bool) {
        let mut inner = self.inner.lock().expect("session lock poisoned");

        let resolved = match query {
            Some(q) => Some(q.to_string()),
            None => inner.previous_query.clone(),
        };
        let resolved = match resolved {
            Some(q) if !q.trim().is_empty() => q,
            _ => return,
        };
        if !force && inner.previous_query.as_deref() == Some(resolved.as_str()) {
            return;
        }

        inner.previous_query = Some(resolved.clone());
        inner.generation += 1;
        let my_generation = inner.generation;

        if let Some(task) = inner.fetch_task.take() {
            task.abort();
        }

        self.state.send_modify(|state| {
            state.results = RemoteResource::Loading;
        });

        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let guard = Arc::clone(&self.inner);
        inner.fetch_task = Some(tokio::spawn(async move {
            let outcome = fetch_food_page(source.as_ref(), &resolved, page).await;

            let inner = guard.lock().expect("session lock poisoned");
            if inner.generation != my_generation {
                debug!("discarding stale result for '{}'", resolved);
                return;
            }
            state.send_modify(|state| apply_outcome(state, page, outcome));
        }));
    }

    /// Move `delta` pages (saturating at the first page) and re-fetch the
    /// current query. Explicit pagination always forces the fetch.
    pub fn change_page(&self, delta: i32) {
        let current = self.state.borrow().current_page;
        let page = current.saturating_add_signed(delta);
        self.search(None, page, true);
    }

    /// Toggle selection of a result item. Selecting a new index resets the
    /// unit and quantity; re-selecting the current index deselects.
    pub fn select_item(&self, index: usize) {
        self.state.send_modify(|state| {
            if state.selected_item == Some(index) {
                state.selected_item = None;
            } else {
                state.selected_item = Some(index);
                state.selected_unit = 0;
                state.quantity = 1.0;
            }
            state.display_stats = display_stats(state);
        });
    }

    /// Switch the active unit basis for the selected item.
    pub fn select_unit(&self, unit_index: usize) {
        self.state.send_modify(|state| {
            state.selected_unit = unit_index;
            state.display_stats = display_stats(state);
        });
    }

    /// Apply a validated quantity multiplier. Rejected values leave state
    /// untouched.
    pub fn set_quantity(&self, quantity: f32) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;
        self.state.send_modify(|state| {
            state.quantity = quantity;
            state.display_stats = display_stats(state);
        });
        Ok(())
    }

    /// Parse and apply a quantity typed by the user.
    pub fn set_quantity_input(&self, input: &str) -> Result<(), ValidationError> {
        self.set_quantity(parse_quantity(input)?)
    }

    /// The active selection as a stageable entry, if a usable item and unit
    /// are selected.
    pub fn current_selection(&self) -> Option<StagedEntry> {
        let state = self.state.borrow();
        let items = match &state.results {
            RemoteResource::Success(items) => items,
            RemoteResource::Loading | RemoteResource::Error(_) => return None,
        };
        let record = state.selected_item.and_then(|i| items.get(i))?;
        record.units.get(state.selected_unit)?;
        Some(StagedEntry {
            record: record.clone(),
            unit_index: state.selected_unit,
            quantity: state.quantity,
        })
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(task) = inner.fetch_task.take() {
                task.abort();
            }
        }
    }
}

fn apply_outcome(
    state: &mut SearchViewState,
    page: u32,
    outcome: Result<SearchPage, crate::errors::FetchError>,
) {
    match outcome {
        Ok(result) => {
            state.results = RemoteResource::Success(result.items);
            state.current_page = page;
            state.has_next_page = result.has_next_page;
            // A fresh result list invalidates whatever was selected.
            state.selected_item = None;
            state.selected_unit = 0;
            state.quantity = 1.0;
            state.display_stats = Vec::new();
        }
        Err(err) => {
            state.results = RemoteResource::Error(err.to_string());
        }
    }
}

// Display vector for the current selection; empty when nothing usable is
// selected (including stale indices left over from an older result list).
fn display_stats(state: &SearchViewState) -> Vec<f32> {
    let items = match &state.results {
        RemoteResource::Success(items) => items,
        RemoteResource::Loading | RemoteResource::Error(_) => return Vec::new(),
    };
    state
        .selected_item
        .and_then(|i| items.get(i))
        .and_then(|record| record.units.get(state.selected_unit))
        .map(|basis| basis.scaled(state.quantity))
        .unwrap_or_default()
}

//! # Diary Module
//!
//! Daily-log aggregation and the date-keyed feed behind the diary screen.
//! The feed holds a long-lived subscription that re-reads the selected
//! day's entries whenever the store signals a change; changing the date
//! cancels the old subscription before the new one starts, so two
//! subscriptions never race to write state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use log::warn;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{LogRow, Store};
use crate::food_model::{MealCategory, UNAVAILABLE};
use crate::staging::{LogEntry, StagedEntry};
use crate::validate::{parse_manual_kcal, validate_entry_title};

/// A day's entries grouped by meal category. Every category is present,
/// possibly empty.
pub type DailyLog = BTreeMap<MealCategory, Vec<LogRow>>;

const STORE_DATE_FMT: &str = "%Y-%m-%d";
const DISPLAY_DATE_FMT: &str = "%d/%m/%Y";

/// Snapshot of everything the diary surface renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DiaryViewState {
    pub date: Option<NaiveDate>,
    pub current_log: DailyLog,
    pub sub_total_kcal: BTreeMap<MealCategory, f32>,
    pub total_kcal: f32,
    /// `None` means no entry is selected.
    pub selected_id: Option<i64>,
}

impl DiaryViewState {
    pub fn display_date(&self) -> String {
        match self.date {
            Some(date) => date.format(DISPLAY_DATE_FMT).to_string(),
            None => "--/--/--".to_string(),
        }
    }
}

impl Default for DiaryViewState {
    fn default() -> Self {
        Self {
            date: None,
            current_log: empty_log(),
            sub_total_kcal: MealCategory::ALL.iter().map(|c| (*c, 0.0)).collect(),
            total_kcal: 0.0,
            selected_id: None,
        }
    }
}

fn empty_log() -> DailyLog {
    MealCategory::ALL.iter().map(|c| (*c, Vec::new())).collect()
}

/// Group one day's rows by meal category.
pub fn group_by_category(rows: Vec<LogRow>) -> DailyLog {
    let mut log = empty_log();
    for row in rows {
        log.entry(row.category).or_default().push(row);
    }
    log
}

/// Per-category kcal totals. Entries whose kcal is unavailable are left out
/// of the sums rather than skewing them negative.
pub fn sub_totals(log: &DailyLog) -> BTreeMap<MealCategory, f32> {
    log.iter()
        .map(|(category, rows)| {
            let total = rows
                .iter()
                .map(|row| row.kcal)
                .filter(|kcal| *kcal != UNAVAILABLE)
                .sum();
            (*category, total)
        })
        .collect()
}

/// Date-keyed diary feed over the store.
pub struct DiaryFeed {
    store: Store,
    state: Arc<watch::Sender<DiaryViewState>>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl DiaryFeed {
    pub fn new(store: Store) -> Self {
        let (state, _) = watch::channel(DiaryViewState::default());
        Self {
            store,
            state: Arc::new(state),
            subscription: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DiaryViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DiaryViewState {
        self.state.borrow().clone()
    }

    /// Point the feed at a date. The previous subscription is cancelled
    /// synchronously before the new one starts; the new one keeps
    /// re-delivering the day's log whenever the store changes.
    pub fn set_date(&self, date: NaiveDate) {
        let mut subscription = self.subscription.lock().unwrap();
        if let Some(task) = subscription.take() {
            task.abort();
        }

        self.state.send_modify(|state| {
            state.date = Some(date);
            state.selected_id = None;
        });

        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let date_key = date.format(STORE_DATE_FMT).to_string();
        *subscription = Some(tokio::spawn(async move {
            let mut changes = store.subscribe_changes();
            loop {
                match store.logs_for_date(&date_key).await {
                    Ok(rows) => {
                        let log = group_by_category(rows);
                        let totals = sub_totals(&log);
                        state.send_modify(|state| {
                            state.total_kcal = totals.values().sum();
                            state.current_log = log.clone();
                            state.sub_total_kcal = totals.clone();
                        });
                    }
                    Err(err) => warn!("diary refresh failed: {:#}", err),
                }
                match changes.recv().await {
                    Ok(()) => {}
                    // Lagging just means several writes landed; re-query once.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Toggle selection of a log entry.
    pub fn select_entry(&self, id: i64) {
        self.state.send_modify(|state| {
            state.selected_id = if state.selected_id == Some(id) {
                None
            } else {
                Some(id)
            };
        });
    }

    /// Log an entry against a category on the feed's current date.
    pub async fn add_entry(&self, category: MealCategory, entry: LogEntry) -> Result<i64> {
        let date = self
            .state
            .borrow()
            .date
            .ok_or_else(|| anyhow::anyhow!("no date selected"))?;
        self.store
            .save_log(&LogRow {
                id: 0,
                category,
                title: entry.title,
                kcal: entry.kcal,
                date: date.format(STORE_DATE_FMT).to_string(),
            })
            .await
    }

    /// Commit a drained staging buffer against a category.
    pub async fn add_staged(&self, category: MealCategory, entries: Vec<StagedEntry>) -> Result<()> {
        for staged in entries {
            self.add_entry(category, staged.log_entry()).await?;
        }
        Ok(())
    }

    /// Validated manual entry ("quick add"): title must be non-blank and
    /// kcal numeric in bounds. Rejection leaves the store untouched.
    pub async fn quick_add(
        &self,
        category: MealCategory,
        title: &str,
        kcal_input: &str,
    ) -> Result<i64> {
        validate_entry_title(title)?;
        let kcal = parse_manual_kcal(kcal_input)?;
        self.add_entry(
            category,
            LogEntry {
                title: title.trim().to_string(),
                kcal,
            },
        )
        .await
    }

    /// Remove a logged entry.
    pub async fn remove_entry(&self, id: i64) -> Result<bool> {
        self.store.delete_log(id).await
    }
}

impl Drop for DiaryFeed {
    fn drop(&mut self) {
        if let Ok(mut subscription) = self.subscription.lock() {
            if let Some(task) = subscription.take() {
                task.abort();
            }
        }
    }
}

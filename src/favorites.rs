//! # Favorites Module
//!
//! Per-category favorites backed by the store. Two long-lived
//! subscriptions drive the view: grouped per-category counts for the
//! feed's whole lifetime, and a per-category food subset that is restarted
//! (old task cancelled first) whenever the selected category changes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::warn;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{food_key, FavoriteRow, Store};
use crate::food_model::{FoodRecord, MealCategory};
use crate::staging::StagedEntry;

/// Snapshot of everything the favorites surface renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FavoritesViewState {
    pub selected_category: Option<MealCategory>,
    pub category_totals: BTreeMap<MealCategory, i64>,
    /// Food records pinned to the selected category; empty when no category
    /// is selected.
    pub favorites: Vec<FoodRecord>,
}

/// Store-backed favorites feed.
pub struct FavoritesFeed {
    store: Store,
    state: Arc<watch::Sender<FavoritesViewState>>,
    counts_task: Mutex<Option<JoinHandle<()>>>,
    subset_task: Mutex<Option<JoinHandle<()>>>,
}

impl FavoritesFeed {
    /// Build the feed and start the category-count subscription. Requires a
    /// running tokio runtime.
    pub fn new(store: Store) -> Self {
        let (state, _) = watch::channel(FavoritesViewState::default());
        let feed = Self {
            store,
            state: Arc::new(state),
            counts_task: Mutex::new(None),
            subset_task: Mutex::new(None),
        };
        feed.start_counts();
        feed
    }

    pub fn subscribe(&self) -> watch::Receiver<FavoritesViewState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FavoritesViewState {
        self.state.borrow().clone()
    }

    fn start_counts(&self) {
        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let mut counts_task = self.counts_task.lock().unwrap();
        if let Some(task) = counts_task.take() {
            task.abort();
        }
        *counts_task = Some(tokio::spawn(async move {
            let mut changes = store.subscribe_changes();
            loop {
                match store.category_counts().await {
                    Ok(counts) => state.send_modify(|state| {
                        state.category_totals = counts.into_iter().collect();
                    }),
                    Err(err) => warn!("favorites count refresh failed: {:#}", err),
                }
                match changes.recv().await {
                    Ok(()) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Select (or clear) the browsed category. The previous subset
    /// subscription is cancelled synchronously before the new one starts.
    pub fn select_category(&self, category: Option<MealCategory>) {
        let mut subset_task = self.subset_task.lock().unwrap();
        if let Some(task) = subset_task.take() {
            task.abort();
        }

        self.state.send_modify(|state| {
            state.selected_category = category;
            state.favorites.clear();
        });

        let category = match category {
            Some(category) => category,
            None => return,
        };

        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        *subset_task = Some(tokio::spawn(async move {
            let mut changes = store.subscribe_changes();
            loop {
                match subset(&store, category).await {
                    Ok(records) => state.send_modify(|state| {
                        state.favorites = records;
                    }),
                    Err(err) => warn!("favorites subset refresh failed: {:#}", err),
                }
                match changes.recv().await {
                    Ok(()) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Pin food records to a category: the food rows are saved first, then
    /// the favorite rows referencing them.
    pub async fn add_favorites(
        &self,
        category: MealCategory,
        records: Vec<FoodRecord>,
    ) -> Result<()> {
        self.store.save_foods(&records).await?;
        for record in &records {
            self.store
                .save_favorite(&FavoriteRow {
                    title: record.title.clone(),
                    image_ref: record.image_ref.clone().unwrap_or_default(),
                    category,
                })
                .await?;
        }
        Ok(())
    }

    /// Commit a drained staging buffer as favorites of one category.
    pub async fn add_staged(
        &self,
        category: MealCategory,
        entries: Vec<StagedEntry>,
    ) -> Result<()> {
        self.add_favorites(category, entries.into_iter().map(|e| e.record).collect())
            .await
    }

    /// Remove a favorite. When this was the food's last favorite in any
    /// category, the food row itself is deleted and the cascade cleans up.
    pub async fn delete_favorite(
        &self,
        category: MealCategory,
        record: &FoodRecord,
    ) -> Result<()> {
        let image_ref = record.image_ref.as_deref().unwrap_or("");
        let count = self
            .store
            .favorite_count_for_food(&record.title, image_ref)
            .await?;
        if count == 1 {
            self.store.delete_food(&record.title, image_ref).await?;
        } else {
            self.store
                .delete_favorite(&record.title, image_ref, category)
                .await?;
        }
        Ok(())
    }
}

async fn subset(store: &Store, category: MealCategory) -> Result<Vec<FoodRecord>> {
    let ids: Vec<String> = store
        .favorites_by_category(category)
        .await?
        .iter()
        .map(|favorite| food_key(&favorite.title, &favorite.image_ref))
        .collect();
    store.foods_by_ids(&ids).await
}

impl Drop for FavoritesFeed {
    fn drop(&mut self) {
        for task in [&self.counts_task, &self.subset_task] {
            if let Ok(mut task) = task.lock() {
                if let Some(task) = task.take() {
                    task.abort();
                }
            }
        }
    }
}

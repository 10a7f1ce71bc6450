//! # Local Store Module
//!
//! rusqlite-backed persistence for foods, diary logs, and favorites. The
//! list-valued nutrient/portion columns of the `food` table are serialized
//! through a generic list ↔ text codec at this boundary; everything above
//! this module works with [`FoodRecord`] values.
//!
//! The connection is owned by an explicitly constructed [`Store`] handle
//! that callers receive by injection. Writes are serialized through the
//! handle's async mutex and each write emits a change signal that the
//! diary/favorites subscriptions re-query on.

use anyhow::{Context, Result};
use log::info;
use rusqlite::{params, params_from_iter, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::food_model::{FoodRecord, MealCategory, UnitBasis};

/// One persisted diary line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    /// Auto-generated; 0 means "not yet persisted".
    pub id: i64,
    pub category: MealCategory,
    pub title: String,
    pub kcal: f32,
    /// ISO `%Y-%m-%d` date the entry was logged against.
    pub date: String,
}

/// One persisted favorite: a food key pinned to a meal category.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRow {
    pub title: String,
    pub image_ref: String,
    pub category: MealCategory,
}

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    info!("Initializing database schema...");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS food (
            title TEXT NOT NULL,
            img_res TEXT NOT NULL,
            portions_list TEXT NOT NULL,
            kcal_list TEXT NOT NULL,
            protein_list TEXT NOT NULL,
            carbs_list TEXT NOT NULL,
            fat_list TEXT NOT NULL,
            PRIMARY KEY (title, img_res)
        );
        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            kcal REAL NOT NULL,
            date TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS logs_date ON logs(date);
        CREATE TABLE IF NOT EXISTS favorites (
            food_title TEXT NOT NULL,
            food_img_res TEXT NOT NULL,
            category TEXT NOT NULL,
            PRIMARY KEY (food_title, food_img_res, category),
            FOREIGN KEY (food_title, food_img_res)
                REFERENCES food (title, img_res)
                ON DELETE CASCADE
        );",
    )
    .context("Failed to create tables")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Encode a list-valued column as text.
pub fn encode_list<T: Serialize>(values: &[T]) -> Result<String> {
    serde_json::to_string(values).context("Failed to encode list column")
}

/// Decode a list-valued column from text.
pub fn decode_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    serde_json::from_str(text).context("Failed to decode list column")
}

// The food table keeps the original five parallel list columns; a record's
// units are split on write and zipped back on read.
fn record_columns(record: &FoodRecord) -> Result<[String; 5]> {
    let labels: Vec<&str> = record.units.iter().map(|u| u.label.as_str()).collect();
    let kcal: Vec<f32> = record.units.iter().map(|u| u.kcal).collect();
    let protein: Vec<f32> = record.units.iter().map(|u| u.protein).collect();
    let carbs: Vec<f32> = record.units.iter().map(|u| u.carbs).collect();
    let fat: Vec<f32> = record.units.iter().map(|u| u.fat).collect();
    Ok([
        encode_list(&labels)?,
        encode_list(&kcal)?,
        encode_list(&protein)?,
        encode_list(&carbs)?,
        encode_list(&fat)?,
    ])
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, [String; 5])> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        [row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
    ))
}

fn assemble_record(title: String, img_res: String, columns: [String; 5]) -> Result<FoodRecord> {
    let [portions, kcal, protein, carbs, fat] = columns;
    let labels: Vec<String> = decode_list(&portions)?;
    let kcal: Vec<f32> = decode_list(&kcal)?;
    let protein: Vec<f32> = decode_list(&protein)?;
    let carbs: Vec<f32> = decode_list(&carbs)?;
    let fat: Vec<f32> = decode_list(&fat)?;

    let units = labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| UnitBasis {
            label,
            kcal: kcal.get(i).copied().unwrap_or(crate::food_model::UNAVAILABLE),
            protein: protein.get(i).copied().unwrap_or(crate::food_model::UNAVAILABLE),
            carbs: carbs.get(i).copied().unwrap_or(crate::food_model::UNAVAILABLE),
            fat: fat.get(i).copied().unwrap_or(crate::food_model::UNAVAILABLE),
        })
        .collect();

    Ok(FoodRecord {
        title,
        image_ref: if img_res.is_empty() { None } else { Some(img_res) },
        units,
    })
}

fn image_column(record: &FoodRecord) -> &str {
    record.image_ref.as_deref().unwrap_or("")
}

/// Composite lookup key used by the favorites subset query.
pub fn food_key(title: &str, image_ref: &str) -> String {
    format!("{}{}", title, image_ref)
}

/// Save a food record, ignoring an existing row with the same key.
pub fn save_food(conn: &Connection, record: &FoodRecord) -> Result<()> {
    let [portions, kcal, protein, carbs, fat] = record_columns(record)?;
    conn.execute(
        "INSERT OR IGNORE INTO food
            (title, img_res, portions_list, kcal_list, protein_list, carbs_list, fat_list)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![record.title, image_column(record), portions, kcal, protein, carbs, fat],
    )
    .context("Failed to insert food record")?;
    Ok(())
}

/// Delete a food row; cascades to any favorites referencing it.
pub fn delete_food(conn: &Connection, title: &str, image_ref: &str) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM food WHERE title = ?1 AND img_res = ?2",
            params![title, image_ref],
        )
        .context("Failed to delete food record")?;
    Ok(rows > 0)
}

/// Food records whose composite key is in `ids` (see [`food_key`]).
pub fn foods_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<FoodRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT title, img_res, portions_list, kcal_list, protein_list, carbs_list, fat_list
         FROM food WHERE (title || img_res) IN ({}) ORDER BY title",
        placeholders
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare food lookup")?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), record_from_row)
        .context("Failed to query food records")?;

    let mut records = Vec::new();
    for row in rows {
        let (title, img_res, columns) = row.context("Failed to read food row")?;
        records.push(assemble_record(title, img_res, columns)?);
    }
    Ok(records)
}

/// Save a diary entry. A row id of 0 inserts a fresh row; anything else
/// replaces the existing row. Returns the persisted row id.
pub fn save_log(conn: &Connection, row: &LogRow) -> Result<i64> {
    if row.id == 0 {
        conn.execute(
            "INSERT INTO logs (category, title, kcal, date) VALUES (?1, ?2, ?3, ?4)",
            params![row.category.as_str(), row.title, row.kcal as f64, row.date],
        )
        .context("Failed to insert log entry")?;
        Ok(conn.last_insert_rowid())
    } else {
        conn.execute(
            "INSERT OR REPLACE INTO logs (id, category, title, kcal, date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![row.id, row.category.as_str(), row.title, row.kcal as f64, row.date],
        )
        .context("Failed to replace log entry")?;
        Ok(row.id)
    }
}

/// All diary entries logged against one date.
pub fn logs_for_date(conn: &Connection, date: &str) -> Result<Vec<LogRow>> {
    let mut stmt = conn
        .prepare("SELECT id, category, title, kcal, date FROM logs WHERE date = ?1 ORDER BY id")
        .context("Failed to prepare log lookup")?;
    let rows = stmt
        .query_map(params![date], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .context("Failed to query log entries")?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, category, title, kcal, date) = row.context("Failed to read log row")?;
        let category = MealCategory::from_str_opt(&category)
            .with_context(|| format!("Unknown meal category in store: {}", category))?;
        entries.push(LogRow {
            id,
            category,
            title,
            kcal: kcal as f32,
            date,
        });
    }
    Ok(entries)
}

/// Delete a diary entry by id.
pub fn delete_log(conn: &Connection, id: i64) -> Result<bool> {
    let rows = conn
        .execute("DELETE FROM logs WHERE id = ?1", params![id])
        .context("Failed to delete log entry")?;
    Ok(rows > 0)
}

/// Save a favorite, ignoring an existing row with the same key.
pub fn save_favorite(conn: &Connection, favorite: &FavoriteRow) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO favorites (food_title, food_img_res, category)
         VALUES (?1, ?2, ?3)",
        params![favorite.title, favorite.image_ref, favorite.category.as_str()],
    )
    .context("Failed to insert favorite")?;
    Ok(())
}

/// Delete one favorite row.
pub fn delete_favorite(
    conn: &Connection,
    title: &str,
    image_ref: &str,
    category: MealCategory,
) -> Result<bool> {
    let rows = conn
        .execute(
            "DELETE FROM favorites
             WHERE food_title = ?1 AND food_img_res = ?2 AND category = ?3",
            params![title, image_ref, category.as_str()],
        )
        .context("Failed to delete favorite")?;
    Ok(rows > 0)
}

/// How many categories hold a favorite for this food.
pub fn favorite_count_for_food(conn: &Connection, title: &str, image_ref: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM favorites WHERE food_title = ?1 AND food_img_res = ?2",
        params![title, image_ref],
        |row| row.get(0),
    )
    .context("Failed to count favorites for food")
}

/// Favorite counts grouped by category.
pub fn category_counts(conn: &Connection) -> Result<Vec<(MealCategory, i64)>> {
    let mut stmt = conn
        .prepare("SELECT category, COUNT(*) FROM favorites GROUP BY category")
        .context("Failed to prepare category counts")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .context("Failed to query category counts")?;

    let mut counts = Vec::new();
    for row in rows {
        let (category, count) = row.context("Failed to read count row")?;
        if let Some(category) = MealCategory::from_str_opt(&category) {
            counts.push((category, count));
        }
    }
    Ok(counts)
}

/// All favorites pinned to one category.
pub fn favorites_by_category(conn: &Connection, category: MealCategory) -> Result<Vec<FavoriteRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT food_title, food_img_res, category FROM favorites
             WHERE category = ?1 ORDER BY food_title",
        )
        .context("Failed to prepare favorites lookup")?;
    let rows = stmt
        .query_map(params![category.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .context("Failed to query favorites")?;

    let mut favorites = Vec::new();
    for row in rows {
        let (title, image_ref) = row.context("Failed to read favorite row")?;
        favorites.push(FavoriteRow {
            title,
            image_ref,
            category,
        });
    }
    Ok(favorites)
}

/// Injected handle to the local store.
///
/// Clones share one connection behind an async mutex, so writes are
/// serialized; every write emits a change signal for the long-lived
/// diary/favorites subscriptions.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    changed: broadcast::Sender<()>,
}

impl Store {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascade from food to favorites relies on this per-connection pragma.
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;
        init_schema(&conn)?;
        let (changed, _) = broadcast::channel(16);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changed,
        })
    }

    /// Receiver signalled after every completed write.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    fn mark_changed(&self) {
        // No receivers is fine; feeds come and go.
        let _ = self.changed.send(());
    }

    pub async fn save_food(&self, record: &FoodRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        save_food(&conn, record)?;
        drop(conn);
        self.mark_changed();
        Ok(())
    }

    pub async fn save_foods(&self, records: &[FoodRecord]) -> Result<()> {
        let conn = self.conn.lock().await;
        for record in records {
            save_food(&conn, record)?;
        }
        drop(conn);
        self.mark_changed();
        Ok(())
    }

    pub async fn delete_food(&self, title: &str, image_ref: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = delete_food(&conn, title, image_ref)?;
        drop(conn);
        self.mark_changed();
        Ok(deleted)
    }

    pub async fn foods_by_ids(&self, ids: &[String]) -> Result<Vec<FoodRecord>> {
        let conn = self.conn.lock().await;
        foods_by_ids(&conn, ids)
    }

    pub async fn save_log(&self, row: &LogRow) -> Result<i64> {
        let conn = self.conn.lock().await;
        let id = save_log(&conn, row)?;
        drop(conn);
        self.mark_changed();
        Ok(id)
    }

    pub async fn logs_for_date(&self, date: &str) -> Result<Vec<LogRow>> {
        let conn = self.conn.lock().await;
        logs_for_date(&conn, date)
    }

    pub async fn delete_log(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = delete_log(&conn, id)?;
        drop(conn);
        self.mark_changed();
        Ok(deleted)
    }

    pub async fn save_favorite(&self, favorite: &FavoriteRow) -> Result<()> {
        let conn = self.conn.lock().await;
        save_favorite(&conn, favorite)?;
        drop(conn);
        self.mark_changed();
        Ok(())
    }

    pub async fn delete_favorite(
        &self,
        title: &str,
        image_ref: &str,
        category: MealCategory,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = delete_favorite(&conn, title, image_ref, category)?;
        drop(conn);
        self.mark_changed();
        Ok(deleted)
    }

    pub async fn favorite_count_for_food(&self, title: &str, image_ref: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        favorite_count_for_food(&conn, title, image_ref)
    }

    pub async fn category_counts(&self) -> Result<Vec<(MealCategory, i64)>> {
        let conn = self.conn.lock().await;
        category_counts(&conn)
    }

    pub async fn favorites_by_category(&self, category: MealCategory) -> Result<Vec<FavoriteRow>> {
        let conn = self.conn.lock().await;
        favorites_by_category(&conn, category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food_model::UNAVAILABLE;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", true).unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(title: &str) -> FoodRecord {
        FoodRecord {
            title: title.to_string(),
            image_ref: Some("img.jpg".to_string()),
            units: vec![
                UnitBasis {
                    label: "100g".to_string(),
                    kcal: 250.0,
                    protein: 10.0,
                    carbs: 30.0,
                    fat: UNAVAILABLE,
                },
                UnitBasis {
                    label: "g".to_string(),
                    kcal: 2.5,
                    protein: 0.1,
                    carbs: 0.3,
                    fat: UNAVAILABLE,
                },
            ],
        }
    }

    #[test]
    fn test_list_codec_round_trip() {
        let values = vec![1.5f32, -1.0, 0.0];
        let encoded = encode_list(&values).unwrap();
        let decoded: Vec<f32> = decode_list(&encoded).unwrap();
        assert_eq!(decoded, values);

        let labels = vec!["100g".to_string(), "g".to_string()];
        let encoded = encode_list(&labels).unwrap();
        let decoded: Vec<String> = decode_list(&encoded).unwrap();
        assert_eq!(decoded, labels);
    }

    #[test]
    fn test_food_round_trip_preserves_units() {
        let conn = test_conn();
        let original = record("Porridge");
        save_food(&conn, &original).unwrap();

        let loaded = foods_by_ids(&conn, &[food_key("Porridge", "img.jpg")]).unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[test]
    fn test_food_save_is_insert_or_ignore() {
        let conn = test_conn();
        let original = record("Porridge");
        save_food(&conn, &original).unwrap();

        let mut changed = original.clone();
        changed.units.truncate(1);
        save_food(&conn, &changed).unwrap();

        let loaded = foods_by_ids(&conn, &[food_key("Porridge", "img.jpg")]).unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[test]
    fn test_missing_image_ref_round_trips_as_none() {
        let conn = test_conn();
        let mut original = record("Plain");
        original.image_ref = None;
        save_food(&conn, &original).unwrap();

        let loaded = foods_by_ids(&conn, &[food_key("Plain", "")]).unwrap();
        assert_eq!(loaded[0].image_ref, None);
    }

    #[test]
    fn test_log_insert_and_date_lookup() {
        let conn = test_conn();
        let id = save_log(
            &conn,
            &LogRow {
                id: 0,
                category: MealCategory::Breakfast,
                title: "Porridge".to_string(),
                kcal: 250.0,
                date: "2026-08-06".to_string(),
            },
        )
        .unwrap();
        assert!(id > 0);

        save_log(
            &conn,
            &LogRow {
                id: 0,
                category: MealCategory::Lunch,
                title: "Soup".to_string(),
                kcal: 180.0,
                date: "2026-08-07".to_string(),
            },
        )
        .unwrap();

        let today = logs_for_date(&conn, "2026-08-06").unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].title, "Porridge");
        assert_eq!(today[0].category, MealCategory::Breakfast);
    }

    #[test]
    fn test_log_replace_by_id() {
        let conn = test_conn();
        let mut row = LogRow {
            id: 0,
            category: MealCategory::Dinner,
            title: "Pasta".to_string(),
            kcal: 600.0,
            date: "2026-08-06".to_string(),
        };
        row.id = save_log(&conn, &row).unwrap();

        row.kcal = 550.0;
        save_log(&conn, &row).unwrap();

        let today = logs_for_date(&conn, "2026-08-06").unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].kcal, 550.0);
    }

    #[test]
    fn test_delete_log() {
        let conn = test_conn();
        let id = save_log(
            &conn,
            &LogRow {
                id: 0,
                category: MealCategory::Drinks,
                title: "Latte".to_string(),
                kcal: 190.0,
                date: "2026-08-06".to_string(),
            },
        )
        .unwrap();

        assert!(delete_log(&conn, id).unwrap());
        assert!(!delete_log(&conn, id).unwrap());
        assert!(logs_for_date(&conn, "2026-08-06").unwrap().is_empty());
    }

    #[test]
    fn test_favorite_counts_and_grouping() {
        let conn = test_conn();
        save_food(&conn, &record("Porridge")).unwrap();
        save_food(&conn, &record("Toast")).unwrap();

        for (title, category) in [
            ("Porridge", MealCategory::Breakfast),
            ("Toast", MealCategory::Breakfast),
            ("Porridge", MealCategory::SweetSnacks),
        ] {
            save_favorite(
                &conn,
                &FavoriteRow {
                    title: title.to_string(),
                    image_ref: "img.jpg".to_string(),
                    category,
                },
            )
            .unwrap();
        }

        assert_eq!(favorite_count_for_food(&conn, "Porridge", "img.jpg").unwrap(), 2);

        let counts = category_counts(&conn).unwrap();
        assert!(counts.contains(&(MealCategory::Breakfast, 2)));
        assert!(counts.contains(&(MealCategory::SweetSnacks, 1)));

        let breakfast = favorites_by_category(&conn, MealCategory::Breakfast).unwrap();
        assert_eq!(breakfast.len(), 2);
    }

    #[test]
    fn test_deleting_food_cascades_to_favorites() {
        let conn = test_conn();
        save_food(&conn, &record("Porridge")).unwrap();
        save_favorite(
            &conn,
            &FavoriteRow {
                title: "Porridge".to_string(),
                image_ref: "img.jpg".to_string(),
                category: MealCategory::Breakfast,
            },
        )
        .unwrap();

        assert!(delete_food(&conn, "Porridge", "img.jpg").unwrap());
        assert_eq!(favorite_count_for_food(&conn, "Porridge", "img.jpg").unwrap(), 0);
    }
}

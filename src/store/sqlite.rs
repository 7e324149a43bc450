use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;

use crate::model::{Category, CategoryRef, Joke, NewJoke};

use super::{JokeStore, Result, StoreError, schema};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_JOKE: &str = "SELECT j.id, j.setup, j.delivery, j.category_id, c.name, j.created_at
     FROM jokes j JOIN categories c ON c.id = j.category_id";

/// SQLite-backed store.
///
/// One connection behind a mutex. Every operation holds the connection for
/// its whole duration, so a transaction is never interleaved with another
/// request's statements.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        // The journal switch takes a lock, so it has to wait its turn too.
        configure(&conn)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Ok(Self::wrap(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl JokeStore for SqliteStore {
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(schema::DDL)?;
        Ok(())
    }

    fn seed_categories(&self, names: &[&str]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for name in names {
            upsert_category(&tx, name)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name, id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_jokes_by_category(
        &self,
        category: &CategoryRef,
        limit: Option<u32>,
    ) -> Result<Option<Vec<Joke>>> {
        let conn = self.lock()?;
        let category_id: Option<i64> = match category {
            CategoryRef::Id(id) => conn
                .query_row("SELECT id FROM categories WHERE id = ?1", params![id], |r| r.get(0))
                .optional()?,
            CategoryRef::Name(name) => conn
                .query_row("SELECT id FROM categories WHERE name = ?1", params![name], |r| r.get(0))
                .optional()?,
        };
        let Some(category_id) = category_id else {
            return Ok(None);
        };

        // SQLite reads a negative LIMIT as "no limit".
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = conn.prepare(&format!(
            "{SELECT_JOKE} WHERE j.category_id = ?1 ORDER BY j.id LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![category_id, limit], JokeRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let jokes = rows.into_iter().map(JokeRow::into_joke).collect::<Result<Vec<_>>>()?;
        Ok(Some(jokes))
    }

    fn random_joke(&self) -> Result<Option<Joke>> {
        let conn = self.lock()?;
        conn.query_row(&format!("{SELECT_JOKE} ORDER BY RANDOM() LIMIT 1"), [], JokeRow::from_row)
            .optional()?
            .map(JokeRow::into_joke)
            .transpose()
    }

    fn get_joke(&self, id: i64) -> Result<Option<Joke>> {
        let conn = self.lock()?;
        fetch_joke(&conn, id)
    }

    fn create_joke(&self, joke: &NewJoke) -> Result<Joke> {
        let created_at = Utc::now();
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let category = upsert_category(&tx, &joke.category)?;
        tx.execute(
            "INSERT INTO jokes(setup, delivery, category_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![joke.setup, joke.delivery, category.id, created_at.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(joke_id = id, category_id = category.id, "joke created");
        Ok(Joke {
            id,
            setup: joke.setup.clone(),
            delivery: joke.delivery.clone(),
            category_id: category.id,
            category: category.name,
            created_at,
        })
    }

    fn update_joke(&self, id: i64, joke: &NewJoke) -> Result<Option<Joke>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM jokes WHERE id = ?1)",
            params![id],
            |r| r.get(0),
        )?;
        if !exists {
            // Dropping `tx` rolls back.
            return Ok(None);
        }

        let category = upsert_category(&tx, &joke.category)?;
        tx.execute(
            "UPDATE jokes SET setup = ?1, delivery = ?2, category_id = ?3 WHERE id = ?4",
            params![joke.setup, joke.delivery, category.id, id],
        )?;
        let updated = fetch_joke(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_joke(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM jokes WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

/// Insert-or-get by name. The UNIQUE NOCASE constraint picks the winner when
/// two sessions race on a new name; the loser's insert is a no-op and both
/// read back the same row.
fn upsert_category(conn: &Connection, name: &str) -> Result<Category> {
    conn.execute(
        "INSERT INTO categories(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    let category = conn.query_row(
        "SELECT id, name FROM categories WHERE name = ?1",
        params![name],
        |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )?;
    Ok(category)
}

fn fetch_joke(conn: &Connection, id: i64) -> Result<Option<Joke>> {
    conn.query_row(&format!("{SELECT_JOKE} WHERE j.id = ?1"), params![id], JokeRow::from_row)
        .optional()?
        .map(JokeRow::into_joke)
        .transpose()
}

/// A joke row as stored, before the timestamp is parsed.
struct JokeRow {
    id: i64,
    setup: String,
    delivery: String,
    category_id: i64,
    category: String,
    created_at: String,
}

impl JokeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            setup: row.get(1)?,
            delivery: row.get(2)?,
            category_id: row.get(3)?,
            category: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_joke(self) -> Result<Joke> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|_| StoreError::Timestamp {
                joke_id: self.id,
                value: self.created_at.clone(),
            })?
            .with_timezone(&Utc);
        Ok(Joke {
            id: self.id,
            setup: self.setup,
            delivery: self.delivery,
            category_id: self.category_id,
            category: self.category,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn new_joke(category: &str) -> NewJoke {
        NewJoke {
            category: category.into(),
            setup: "Why did the scarecrow win an award?".into(),
            delivery: "He was outstanding in his field.".into(),
        }
    }

    #[test]
    fn category_lookup_ignores_case_but_keeps_first_spelling() {
        let store = store();
        let first = store.create_joke(&new_joke("Farm")).unwrap();
        let second = store.create_joke(&new_joke("FARM")).unwrap();
        assert_eq!(first.category_id, second.category_id);
        assert_eq!(second.category, "Farm");
        assert_eq!(store.list_categories().unwrap().len(), 1);
    }

    #[test]
    fn failed_insert_rolls_back_the_new_category() {
        let store = store();
        {
            let conn = store.lock().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER reject_jokes BEFORE INSERT ON jokes
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        }

        let err = store.create_joke(&new_joke("Orphan")).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(store.list_categories().unwrap().is_empty());
    }

    #[test]
    fn unparseable_timestamp_surfaces_as_error() {
        let store = store();
        let joke = store.create_joke(&new_joke("Puns")).unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute("UPDATE jokes SET created_at = 'yesterday' WHERE id = ?1", params![joke.id])
                .unwrap();
        }
        assert!(matches!(
            store.get_joke(joke.id),
            Err(StoreError::Timestamp { joke_id, .. }) if joke_id == joke.id
        ));
    }

    #[test]
    fn open_waits_for_a_locked_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");
        let holder = Connection::open(&path).unwrap();
        holder
            .execute_batch("CREATE TABLE t(x); BEGIN EXCLUSIVE; INSERT INTO t VALUES (1);")
            .unwrap();

        let opener = {
            let path = path.clone();
            std::thread::spawn(move || SqliteStore::open(&path).map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(200));
        holder.execute_batch("COMMIT;").unwrap();

        assert!(opener.join().unwrap().is_ok());
    }

    #[test]
    fn update_of_missing_joke_leaves_categories_alone() {
        let store = store();
        assert_eq!(store.update_joke(41, &new_joke("Ghost")).unwrap(), None);
        assert!(store.list_categories().unwrap().is_empty());
    }
}

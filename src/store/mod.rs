//! Persistence behind the [`JokeStore`] trait.
//!
//! Two backends: [`SqliteStore`] for real deployments and [`MemoryStore`]
//! for tests and throwaway instances. Both give the same answers for the
//! same sequence of calls; `tests/store_contract.rs` runs against each.
//!
//! Not-found is never an error here. Lookups return `Option`, deletes return
//! `bool`, and `Err` is reserved for a backend that could not complete.

use thiserror::Error;

use crate::model::{Category, CategoryRef, Joke, NewJoke};

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("bad timestamp `{value}` on joke {joke_id}")]
    Timestamp { joke_id: i64, value: String },
}

/// Categories seeded by the binary at start-up unless disabled.
pub const DEFAULT_CATEGORIES: &[&str] = &["Dad", "Knock Knock", "Programming", "Puns"];

pub trait JokeStore: Send + Sync + 'static {
    /// Creates the tables if they do not exist yet.
    fn init_schema(&self) -> Result<()>;

    /// Inserts each name unless a category with that name already exists.
    fn seed_categories(&self, names: &[&str]) -> Result<()>;

    /// All categories, ordered by name (case-insensitive).
    fn list_categories(&self) -> Result<Vec<Category>>;

    /// Jokes in the category ordered by id, at most `limit` of them.
    /// `None` when the category does not exist.
    fn list_jokes_by_category(
        &self,
        category: &CategoryRef,
        limit: Option<u32>,
    ) -> Result<Option<Vec<Joke>>>;

    /// One joke chosen uniformly at random, `None` when there are none.
    fn random_joke(&self) -> Result<Option<Joke>>;

    fn get_joke(&self, id: i64) -> Result<Option<Joke>>;

    /// Finds or creates the category by name, then inserts the joke. Either
    /// both happen or neither does.
    fn create_joke(&self, joke: &NewJoke) -> Result<Joke>;

    /// Replaces every field of joke `id`, finding or creating its category.
    /// `None` when no joke has that id, in which case nothing changes.
    fn update_joke(&self, id: i64, joke: &NewJoke) -> Result<Option<Joke>>;

    /// `false` when no joke has that id.
    fn delete_joke(&self, id: i64) -> Result<bool>;

    /// Cheap round-trip to the backend for readiness checks.
    fn ping(&self) -> Result<()>;
}

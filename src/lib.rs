//! # jokebook
//!
//! A small JSON API for jokes grouped into categories.
//!
//! Every request flows one way: [`Router`] → [`controller`] → [`JokeStore`].
//! The router only dispatches, the controller validates and shapes the
//! response, and the store owns all persistence.
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/categories` | all categories as `{id, name}` |
//! | GET | `/categories/{category}` | jokes in a category, by id or name, `?limit=N` |
//! | GET | `/random` | one joke at random |
//! | GET | `/jokes/{id}` | one joke |
//! | POST | `/jokes` | add a joke, creating its category if needed |
//! | PUT | `/jokes/{id}` | replace a joke |
//! | DELETE | `/jokes/{id}` | remove a joke |
//! | GET | `/healthz`, `/readyz` | health probes |
//!
//! Errors are always `{"error": "..."}`.
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jokebook::{JokeStore, MemoryStore, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jokebook::Error> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.seed_categories(&["Puns"])?;
//!     Server::bind("127.0.0.1:3000").serve(jokebook::app(store)).await
//! }
//! ```

use std::sync::Arc;

use tracing::info;

mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod config;
pub mod controller;
pub mod health;
pub mod logging;
pub mod model;
pub mod store;

pub use config::{Config, Database};
pub use controller::SharedStore;
pub use error::{ApiError, Error};
pub use handler::{Handler, with_state};
pub use method::Method;
pub use model::{Category, CategoryRef, Joke, NewJoke};
pub use request::Request;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
pub use store::{JokeStore, MemoryStore, SqliteStore, StoreError};

/// The full route table over `store`.
pub fn app(store: SharedStore) -> Router {
    Router::new()
        .get("/categories",            with_state(Arc::clone(&store), controller::list_categories))
        .get("/categories/{category}", with_state(Arc::clone(&store), controller::list_jokes_by_category))
        .get("/random",                with_state(Arc::clone(&store), controller::random_joke))
        .post("/jokes",                with_state(Arc::clone(&store), controller::add_joke))
        .get("/jokes/{id}",            with_state(Arc::clone(&store), controller::get_joke))
        .put("/jokes/{id}",            with_state(Arc::clone(&store), controller::update_joke))
        .delete("/jokes/{id}",         with_state(Arc::clone(&store), controller::delete_joke))
        .get("/healthz",               health::liveness)
        .get("/readyz",                with_state(store, health::readiness))
}

/// Opens the configured store and makes sure its schema exists.
pub fn open_store(database: &Database) -> Result<SharedStore, StoreError> {
    let store: SharedStore = match database {
        Database::Sqlite(path) => Arc::new(SqliteStore::open(path)?),
        Database::SqliteMemory => Arc::new(SqliteStore::open_in_memory()?),
        Database::Memory => Arc::new(MemoryStore::new()),
    };
    store.init_schema()?;
    Ok(store)
}

/// Bootstraps the store from `config` and serves until shutdown.
pub async fn run(config: Config) -> Result<(), Error> {
    let store = open_store(&config.database)?;
    if config.seed {
        store.seed_categories(store::DEFAULT_CATEGORIES)?;
        info!(count = store::DEFAULT_CATEGORIES.len(), "default categories seeded");
    }

    Server::bind(config.addr()).serve(app(store)).await
}

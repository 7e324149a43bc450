//! Request validation and response shaping.
//!
//! Each handler validates its input, makes exactly one store call on the
//! blocking pool, and maps the outcome to a status and JSON body. Nothing
//! here outlives a request.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::model::{Category, CategoryRef, Joke, NewJoke};
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::status::Status;
use crate::store::{self, JokeStore, StoreError};

pub type SharedStore = Arc<dyn JokeStore>;

type ApiResult<T> = Result<T, ApiError>;

/// Runs one synchronous store call off the async worker threads.
pub(crate) async fn blocking<T, F>(store: &SharedStore, f: F) -> ApiResult<T>
where
    F: FnOnce(&dyn JokeStore) -> store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(StoreError::from)?;
    Ok(result?)
}

// GET /categories
pub async fn list_categories(store: SharedStore, _req: Request) -> ApiResult<Json<Vec<Category>>> {
    let categories = blocking(&store, |s| s.list_categories()).await?;
    Ok(Json(categories))
}

// GET /categories/{category}?limit=N
pub async fn list_jokes_by_category(store: SharedStore, req: Request) -> ApiResult<Json<Vec<Joke>>> {
    let category = parse_category_ref(req.param("category").unwrap_or_default())?;
    let limit = parse_limit(req.query("limit"))?;

    let lookup = category.clone();
    match blocking(&store, move |s| s.list_jokes_by_category(&lookup, limit)).await? {
        None => Err(ApiError::NotFound(format!("category '{category}' not found"))),
        Some(jokes) if jokes.is_empty() => {
            Err(ApiError::NotFound(format!("category '{category}' has no jokes")))
        }
        Some(jokes) => Ok(Json(jokes)),
    }
}

// GET /random
pub async fn random_joke(store: SharedStore, _req: Request) -> ApiResult<Json<Joke>> {
    blocking(&store, |s| s.random_joke())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("there are no jokes yet".to_owned()))
}

// GET /jokes/{id}
pub async fn get_joke(store: SharedStore, req: Request) -> ApiResult<Json<Joke>> {
    let id = parse_id(req.param("id").unwrap_or_default())?;
    blocking(&store, move |s| s.get_joke(id))
        .await?
        .map(Json)
        .ok_or_else(|| joke_not_found(id))
}

// POST /jokes
pub async fn add_joke(store: SharedStore, req: Request) -> ApiResult<Response> {
    let joke = parse_joke_body(&req)?;
    let created = blocking(&store, move |s| s.create_joke(&joke)).await?;
    info!(joke_id = created.id, category = %created.category, "joke added");

    let location = format!("/jokes/{}", created.id);
    let mut res = (Status::Created, Json(created)).into_response();
    res.headers.push(("location".to_owned(), location));
    Ok(res)
}

// PUT /jokes/{id}
pub async fn update_joke(store: SharedStore, req: Request) -> ApiResult<Json<Joke>> {
    let id = parse_id(req.param("id").unwrap_or_default())?;
    let joke = parse_joke_body(&req)?;
    blocking(&store, move |s| s.update_joke(id, &joke))
        .await?
        .map(Json)
        .ok_or_else(|| joke_not_found(id))
}

// DELETE /jokes/{id}
pub async fn delete_joke(store: SharedStore, req: Request) -> ApiResult<Status> {
    let id = parse_id(req.param("id").unwrap_or_default())?;
    if blocking(&store, move |s| s.delete_joke(id)).await? {
        info!(joke_id = id, "joke deleted");
        Ok(Status::NoContent)
    } else {
        Err(joke_not_found(id))
    }
}

fn joke_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("joke {id} not found"))
}

// ── Input parsing ────────────────────────────────────────────────────────────

fn parse_id(raw: &str) -> ApiResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::Validation(format!(
            "joke id must be a positive integer, got '{raw}'"
        ))),
    }
}

/// Integers are ids; anything else is a name. A name made only of digits is
/// therefore unreachable through this route.
fn parse_category_ref(raw: &str) -> ApiResult<CategoryRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("category must not be empty".to_owned()));
    }
    let looks_numeric = trimmed.bytes().all(|b| b.is_ascii_digit());
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(CategoryRef::Id(id)),
        Ok(_) => Err(ApiError::Validation(format!(
            "category id must be a positive integer, got '{trimmed}'"
        ))),
        Err(_) if looks_numeric => Err(ApiError::Validation(format!(
            "category id '{trimmed}' is out of range"
        ))),
        Err(_) => Ok(CategoryRef::Name(trimmed.to_owned())),
    }
}

fn parse_limit(raw: Option<&str>) -> ApiResult<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(limit) if limit > 0 => Ok(Some(limit)),
        _ => Err(ApiError::Validation(format!(
            "limit must be a positive integer, got '{raw}'"
        ))),
    }
}

#[derive(Deserialize)]
struct JokeBody {
    category: Option<String>,
    setup: Option<String>,
    #[serde(alias = "punchline")]
    delivery: Option<String>,
}

fn parse_joke_body(req: &Request) -> ApiResult<NewJoke> {
    let not_an_object = || ApiError::Validation("request body must be a JSON object".to_owned());

    let value: serde_json::Value = req.json().map_err(|_| not_an_object())?;
    if !value.is_object() {
        return Err(not_an_object());
    }
    let body: JokeBody = serde_json::from_value(value)
        .map_err(|e| ApiError::Validation(format!("invalid request body: {e}")))?;

    let category = non_blank(body.category);
    let setup = non_blank(body.setup);
    let delivery = non_blank(body.delivery);

    match (category, setup, delivery) {
        (Some(category), Some(setup), Some(delivery)) => Ok(NewJoke { category, setup, delivery }),
        (category, setup, delivery) => {
            let missing: Vec<&str> = [
                ("category", category.is_none()),
                ("setup", setup.is_none()),
                ("delivery", delivery.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            Err(ApiError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

fn non_blank(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

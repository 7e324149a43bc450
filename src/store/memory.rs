use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rand::seq::SliceRandom;

use crate::model::{Category, CategoryRef, Joke, NewJoke};

use super::{JokeStore, Result, StoreError};

/// In-process store over plain vectors. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    jokes: Vec<Joke>,
    last_category_id: i64,
    last_joke_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl State {
    fn find_category(&self, category: &CategoryRef) -> Option<&Category> {
        self.categories.iter().find(|c| match category {
            CategoryRef::Id(id) => c.id == *id,
            CategoryRef::Name(name) => c.name.eq_ignore_ascii_case(name),
        })
    }

    fn upsert_category(&mut self, name: &str) -> Category {
        if let Some(existing) = self.find_category(&CategoryRef::Name(name.to_owned())) {
            return existing.clone();
        }
        self.last_category_id += 1;
        let category = Category {
            id: self.last_category_id,
            name: name.to_owned(),
        };
        self.categories.push(category.clone());
        category
    }
}

impl JokeStore for MemoryStore {
    fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    fn seed_categories(&self, names: &[&str]) -> Result<()> {
        let mut state = self.lock()?;
        for name in names {
            state.upsert_category(name);
        }
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.lock()?;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| {
            a.name.to_ascii_lowercase()
                .cmp(&b.name.to_ascii_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(categories)
    }

    fn list_jokes_by_category(
        &self,
        category: &CategoryRef,
        limit: Option<u32>,
    ) -> Result<Option<Vec<Joke>>> {
        let state = self.lock()?;
        let Some(category) = state.find_category(category) else {
            return Ok(None);
        };
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        // `jokes` is kept in id order.
        let jokes = state.jokes.iter()
            .filter(|j| j.category_id == category.id)
            .take(limit)
            .cloned()
            .collect();
        Ok(Some(jokes))
    }

    fn random_joke(&self) -> Result<Option<Joke>> {
        let state = self.lock()?;
        Ok(state.jokes.choose(&mut rand::thread_rng()).cloned())
    }

    fn get_joke(&self, id: i64) -> Result<Option<Joke>> {
        let state = self.lock()?;
        Ok(state.jokes.iter().find(|j| j.id == id).cloned())
    }

    fn create_joke(&self, joke: &NewJoke) -> Result<Joke> {
        let mut state = self.lock()?;
        let category = state.upsert_category(&joke.category);
        state.last_joke_id += 1;
        let created = Joke {
            id: state.last_joke_id,
            setup: joke.setup.clone(),
            delivery: joke.delivery.clone(),
            category_id: category.id,
            category: category.name,
            created_at: Utc::now(),
        };
        state.jokes.push(created.clone());
        Ok(created)
    }

    fn update_joke(&self, id: i64, joke: &NewJoke) -> Result<Option<Joke>> {
        let mut state = self.lock()?;
        let Some(index) = state.jokes.iter().position(|j| j.id == id) else {
            return Ok(None);
        };
        let category = state.upsert_category(&joke.category);
        let existing = &mut state.jokes[index];
        existing.setup = joke.setup.clone();
        existing.delivery = joke.delivery.clone();
        existing.category_id = category.id;
        existing.category = category.name;
        Ok(Some(existing.clone()))
    }

    fn delete_joke(&self, id: i64) -> Result<bool> {
        let mut state = self.lock()?;
        let before = state.jokes.len();
        state.jokes.retain(|j| j.id != id);
        Ok(state.jokes.len() != before)
    }

    fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

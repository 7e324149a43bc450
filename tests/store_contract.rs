use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use jokebook::{CategoryRef, JokeStore, MemoryStore, NewJoke, SqliteStore};
use tempfile::tempdir;

fn joke(category: &str, setup: &str) -> NewJoke {
    NewJoke {
        category: category.into(),
        setup: setup.into(),
        delivery: format!("the answer to {setup}"),
    }
}

fn sqlite_file(path: &Path) -> SqliteStore {
    let store = SqliteStore::open(path).unwrap();
    store.init_schema().unwrap();
    store
}

/// Runs `check` against a fresh store of every kind.
fn each_store(check: impl Fn(&dyn JokeStore)) {
    let dir = tempdir().unwrap();
    check(&sqlite_file(&dir.path().join("jokes.db")));

    let memory = MemoryStore::new();
    memory.init_schema().unwrap();
    check(&memory);
}

#[test]
fn created_joke_is_listed_exactly_once() {
    each_store(|store| {
        let created = store.create_joke(&joke("Puns", "Why did the cookie cry?")).unwrap();
        store.create_joke(&joke("Dad", "What do you call a fake noodle?")).unwrap();

        let by_name = store
            .list_jokes_by_category(&CategoryRef::Name("puns".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(by_name, vec![created.clone()]);

        let by_id = store
            .list_jokes_by_category(&CategoryRef::Id(created.category_id), None)
            .unwrap()
            .unwrap();
        assert_eq!(by_id, vec![created]);
    });
}

#[test]
fn missing_category_is_none_and_empty_category_is_empty() {
    each_store(|store| {
        store.seed_categories(&["Knock Knock"]).unwrap();
        assert_eq!(
            store.list_jokes_by_category(&CategoryRef::Name("Limericks".into()), None).unwrap(),
            None
        );
        assert_eq!(
            store.list_jokes_by_category(&CategoryRef::Name("knock knock".into()), None).unwrap(),
            Some(vec![])
        );
        assert_eq!(store.list_jokes_by_category(&CategoryRef::Id(404), None).unwrap(), None);
    });
}

#[test]
fn jokes_come_back_in_id_order_up_to_limit() {
    each_store(|store| {
        let ids: Vec<i64> = (0..4)
            .map(|n| store.create_joke(&joke("Programming", &format!("q{n}"))).unwrap().id)
            .collect();
        let listed: Vec<i64> = store
            .list_jokes_by_category(&CategoryRef::Name("Programming".into()), Some(3))
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(listed, ids[..3].to_vec());
    });
}

#[test]
fn categories_sort_by_name_ignoring_case() {
    each_store(|store| {
        store.seed_categories(&["puns", "Animals", "dad"]).unwrap();
        store.seed_categories(&["PUNS"]).unwrap();
        let names: Vec<String> = store.list_categories().unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Animals", "dad", "puns"]);
    });
}

#[test]
fn random_joke_is_none_when_empty_and_covers_every_joke() {
    each_store(|store| {
        assert_eq!(store.random_joke().unwrap(), None);

        let ids: HashSet<i64> = (0..3)
            .map(|n| store.create_joke(&joke("Dad", &format!("r{n}"))).unwrap().id)
            .collect();
        let mut seen = HashSet::new();
        for _ in 0..300 {
            seen.insert(store.random_joke().unwrap().unwrap().id);
        }
        assert_eq!(seen, ids);
    });
}

#[test]
fn update_moves_joke_and_delete_reports_misses() {
    each_store(|store| {
        let original = store.create_joke(&joke("Dad", "old setup")).unwrap();
        let updated = store
            .update_joke(original.id, &joke("Puns", "new setup"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.setup, "new setup");
        assert_eq!(updated.category, "Puns");
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(store.get_joke(original.id).unwrap(), Some(updated));

        assert!(store.delete_joke(original.id).unwrap());
        assert!(!store.delete_joke(original.id).unwrap());
        assert_eq!(store.get_joke(original.id).unwrap(), None);
        assert_eq!(store.update_joke(original.id, &joke("Puns", "again")).unwrap(), None);
    });
}

#[test]
fn ids_are_not_reused_after_delete() {
    each_store(|store| {
        let first = store.create_joke(&joke("Dad", "one")).unwrap();
        assert!(store.delete_joke(first.id).unwrap());
        let second = store.create_joke(&joke("Dad", "two")).unwrap();
        assert!(second.id > first.id);
    });
}

#[test]
fn sqlite_data_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("jokes.db");
    let created = sqlite_file(&path).create_joke(&joke("Puns", "persisted")).unwrap();

    let reopened = sqlite_file(&path);
    assert_eq!(reopened.get_joke(created.id).unwrap(), Some(created));
}

#[test]
fn racing_sessions_create_one_category() {
    const WRITERS: usize = 8;
    let dir = tempdir().unwrap();
    let path = dir.path().join("race.db");
    sqlite_file(&path);

    // Separate connections to one file, released together.
    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let store = SqliteStore::open(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.create_joke(&joke("Brand New", &format!("w{n}"))).unwrap()
            })
        })
        .collect();
    let jokes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let store = sqlite_file(&path);
    let categories = store.list_categories().unwrap();
    assert_eq!(categories.len(), 1);
    assert!(jokes.iter().all(|j| j.category_id == categories[0].id));

    let listed = store
        .list_jokes_by_category(&CategoryRef::Name("Brand New".into()), None)
        .unwrap()
        .unwrap();
    assert_eq!(listed.len(), WRITERS);
}

#[test]
fn shared_memory_store_creates_one_category() {
    let store = Arc::new(MemoryStore::new());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.create_joke(&joke("brand new", &format!("m{n}"))).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.list_categories().unwrap().len(), 1);
}

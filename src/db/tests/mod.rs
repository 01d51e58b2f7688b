//! Tests against a real PostgreSQL server. They are skipped unless
//! `TOME_TEST_CONFIG` points to a config file with DB credentials.

use juniper::Variables;
use serde_json::{json, Value};

use crate::{
    api::{self, model::book::Book},
    prelude::*,
    remote::SpellSource,
    store::{Document, Filter, Kind, Store, StoreError, Stored},
};
use self::util::TestDb;

mod util;


macro_rules! test_db {
    () => {
        match TestDb::with_migrations().await? {
            Some(db) => db,
            None => return Ok(()),
        }
    };
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn names(docs: &[Stored]) -> Vec<&str> {
    docs.iter().map(|s| s.doc["name"].as_str().unwrap()).collect()
}

async fn save_all(store: &Store, kind: Kind, docs: Vec<Value>) -> Result<()> {
    for d in docs {
        store.save(kind, doc(d)).await?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn save_returns_stored_document() -> Result<()> {
    let db = test_db!();
    let store = db.store();

    let body = json!({ "name": "Fireball", "level": "3", "ritual": "no" });
    let saved = store.save(Kind::Spell, doc(body.clone())).await?;
    assert_eq!(Value::Object(saved.doc.clone()), body);

    let id = saved.key.to_string();
    let found = store.find_by_id(Kind::Spell, &id).await?.unwrap();
    assert_eq!(found.key, saved.key);
    assert_eq!(Value::Object(found.doc), body);

    // Each kind has its own table.
    assert!(store.find_by_id(Kind::Book, &id).await?.is_none());
    assert!(store.find_by_id(Kind::Spell, "987654").await?.is_none());
    assert!(matches!(
        store.find_by_id(Kind::Spell, "fireball").await,
        Err(StoreError::MalformedId(_)),
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn results_are_ordered_by_id() -> Result<()> {
    let db = test_db!();
    let store = db.store();
    save_all(&store, Kind::Author, ["Ursula", "Terry", "Agatha", "Bram"].into_iter()
        .map(|name| json!({ "name": name }))
        .collect()).await?;

    let all = store.find(Kind::Author, &Filter::All).await?;
    assert_eq!(names(&all), ["Ursula", "Terry", "Agatha", "Bram"]);
    assert!(all.windows(2).all(|w| w[0].key < w[1].key));
    assert!(store.find(Kind::Book, &Filter::All).await?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn eq_filter_matches_whole_value() -> Result<()> {
    let db = test_db!();
    let store = db.store();
    save_all(&store, Kind::Book, vec![
        json!({ "name": "A", "authorID": "1" }),
        json!({ "name": "B", "authorID": "12" }),
        json!({ "name": "C", "authorID": "1" }),
        json!({ "name": "D" }),
        json!({ "name": "E", "authorID": 1 }),
    ]).await?;

    let by_one = store.find(Kind::Book, &Filter::Eq { field: "authorID", value: "1".into() }).await?;
    // `->>` renders the number 1 as "1" as well.
    assert_eq!(names(&by_one), ["A", "C", "E"]);

    let by_twelve = store.find(Kind::Book, &Filter::Eq { field: "authorID", value: "12".into() }).await?;
    assert_eq!(names(&by_twelve), ["B"]);

    let none = store.find(Kind::Book, &Filter::Eq { field: "authorID", value: "".into() }).await?;
    assert!(none.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn contains_filter_is_literal() -> Result<()> {
    let db = test_db!();
    let store = db.store();
    save_all(&store, Kind::Spell, vec![
        json!({ "name": "100% Fire" }),
        json!({ "name": "Fire_Bolt" }),
        json!({ "name": "Fire Bolt" }),
        json!({ "name": "Regex .* Ray" }),
        json!({ "name": "fireball" }),
        json!({ "level": "9" }),
    ]).await?;

    let search = |needle: &str| Filter::Contains { field: "name", needle: needle.into() };
    assert_eq!(names(&store.find(Kind::Spell, &search("%")).await?), ["100% Fire"]);
    assert_eq!(names(&store.find(Kind::Spell, &search("_")).await?), ["Fire_Bolt"]);
    assert_eq!(names(&store.find(Kind::Spell, &search(".*")).await?), ["Regex .* Ray"]);
    assert_eq!(
        names(&store.find(Kind::Spell, &search("Fire")).await?),
        ["100% Fire", "Fire_Bolt", "Fire Bolt"],
    );
    assert!(store.find(Kind::Spell, &search("F.re")).await?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_documents_fail_to_decode() -> Result<()> {
    let db = test_db!();
    let store = db.store();
    let key = db.insert_raw("books", json!({ "name": "Bad", "pages": "many" })).await?;

    match store.load::<Book>(&Filter::All).await {
        Err(StoreError::Decode { kind, key: bad, .. }) => {
            assert_eq!(kind, Kind::Book);
            assert_eq!(bad, key);
        }
        other => panic!("expected decode error, got {other:?}"),
    }

    // The check constraint keeps non-objects out entirely.
    assert!(db.insert_raw("books", json!(["not", "an", "object"])).await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn graphql_over_postgres() -> Result<()> {
    let db = test_db!();
    let context = api::Context { store: db.store(), spells: SpellSource::Store };
    let context = &context;
    let run = move |query: String| async move {
        let (data, errors) = juniper::execute(
            &query,
            None,
            &api::root_node(),
            &Variables::new(),
            context,
        ).await.unwrap();
        assert!(errors.is_empty(), "{errors:?}");
        serde_json::to_value(&data).unwrap()
    };

    let out = run(r#"mutation { addAuthor(name: "Terry Pratchett", age: 66) { id } }"#.into()).await;
    let author = out["addAuthor"]["id"].as_str().unwrap().to_owned();
    for name in ["Mort", "Sourcery"] {
        run(format!(r#"mutation {{
            addBook(name: "{name}", pages: 250, authorID: "{author}") {{ id }}
        }}"#)).await;
    }
    run(r#"mutation { addBook(name: "Orphan", pages: 1, authorID: "424242") { id } }"#.into()).await;

    let out = run(format!(r#"{{
        author(id: "{author}") {{ name book {{ name authorID }} }}
        books {{ name author {{ name }} }}
    }}"#)).await;
    assert_eq!(out, json!({
        "author": {
            "name": "Terry Pratchett",
            "book": [
                { "name": "Mort", "authorID": author },
                { "name": "Sourcery", "authorID": author },
            ],
        },
        "books": [
            { "name": "Mort", "author": { "name": "Terry Pratchett" } },
            { "name": "Sourcery", "author": { "name": "Terry Pratchett" } },
            { "name": "Orphan", "author": null },
        ],
    }));
    Ok(())
}

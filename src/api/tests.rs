use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{body::Incoming, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use juniper::{GraphQLError, Variables};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::{
    remote::{SpellClient, SpellSource, SpellSourceKind, SpellsConfig},
    store::Store,
};
use super::{Context, root_node};


fn store_context() -> Context {
    Context {
        store: Store::in_memory(),
        spells: SpellSource::Store,
    }
}

/// Executes the query and returns the data and the errors, both as JSON.
async fn run(query: &str, context: &Context) -> (Value, Vec<Value>) {
    let (data, errors) = juniper::execute(query, None, &root_node(), &Variables::new(), context)
        .await
        .expect("query failed validation");

    let errors = errors.iter()
        .map(|e| json!({
            "message": e.error().message(),
            "extensions": serde_json::to_value(e.error().extensions()).unwrap(),
        }))
        .collect();
    (serde_json::to_value(&data).unwrap(), errors)
}

/// Executes a query that is expected to have no errors and returns its data.
async fn data(query: &str, context: &Context) -> Value {
    let (data, errors) = run(query, context).await;
    assert!(errors.is_empty(), "unexpected errors: {errors:#?}");
    data
}

async fn add_author(name: &str, age: i32, context: &Context) -> String {
    let out = data(
        &format!(r#"mutation {{ addAuthor(name: "{name}", age: {age}) {{ id }} }}"#),
        context,
    ).await;
    out["addAuthor"]["id"].as_str().unwrap().to_owned()
}

async fn add_book(name: &str, author_id: &str, context: &Context) -> String {
    let out = data(
        &format!(r#"mutation {{
            addBook(name: "{name}", pages: 300, authorID: "{author_id}") {{ id }}
        }}"#),
        context,
    ).await;
    out["addBook"]["id"].as_str().unwrap().to_owned()
}

async fn add_spell(name: &str, context: &Context) -> Value {
    data(&add_spell_mutation(name), context).await
}

fn add_spell_mutation(name: &str) -> String {
    format!(r#"mutation {{
        addSpell(
            name: "{name}",
            description: "Some description",
            higherLevel: "More damage",
            page: "phb 241",
            range: "150 feet",
            components: "V, S, M",
            material: "Bat guano",
            ritual: "no",
            duration: "Instantaneous",
            concentration: "no",
            castingTime: "1 action",
            level: "3",
            school: "Evocation",
            class: "Sorcerer, Wizard",
            archetype: "",
            domains: "Light",
            patrons: "The Fiend",
            oaths: "",
        ) {{ id name level class oaths }}
    }}"#)
}


#[tokio::test]
async fn add_and_load_spell() {
    let context = store_context();
    let out = add_spell("Fireball", &context).await;
    let spell = &out["addSpell"];
    assert_eq!(spell["name"], "Fireball");
    assert_eq!(spell["level"], "3");
    assert_eq!(spell["class"], "Sorcerer, Wizard");
    assert_eq!(spell["oaths"], "");

    let id = spell["id"].as_str().unwrap();
    let out = data(
        &format!(r#"{{ spell(id: "{id}") {{ id name castingTime higherLevel patrons }} }}"#),
        &context,
    ).await;
    assert_eq!(out, json!({
        "spell": {
            "id": id,
            "name": "Fireball",
            "castingTime": "1 action",
            "higherLevel": "More damage",
            "patrons": "The Fiend",
        },
    }));
}

#[tokio::test]
async fn spell_without_id_is_null_without_lookup() {
    let context = store_context();
    let out = data("{ spell { name } }", &context).await;
    assert_eq!(out, json!({ "spell": null }));
    assert_eq!(context.store.num_calls(), 0);
}

#[tokio::test]
async fn unknown_ids_are_null() {
    let context = store_context();
    let out = data(r#"{
        spell(id: "17") { name }
        book(id: "17") { name }
        author(id: "17") { name }
    }"#, &context).await;
    assert_eq!(out, json!({ "spell": null, "book": null, "author": null }));
}

#[tokio::test]
async fn malformed_id_is_invalid_input() {
    let context = store_context();
    let (out, errors) = run(r#"{ spell(id: "fireball") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spell": null }));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["extensions"], json!({ "kind": "INVALID_INPUT", "key": "malformed-id" }));
}

#[tokio::test]
async fn spells_filtered_by_name() {
    let context = store_context();
    for name in ["Fireball", "Ice Storm", "Delayed Blast Fireball", "fire shield"] {
        add_spell(name, &context).await;
    }

    let out = data(r#"{ spells(name: "Fireball") { name } }"#, &context).await;
    assert_eq!(out, json!({
        "spells": [{ "name": "Fireball" }, { "name": "Delayed Blast Fireball" }],
    }));

    let out = data(r#"{ spells(name: "Fire") { name } }"#, &context).await;
    assert_eq!(out["spells"].as_array().unwrap().len(), 2);

    let out = data(r#"{ spells(name: ".*") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spells": [] }));

    let out = data("{ spells { name } }", &context).await;
    assert_eq!(out["spells"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn author_books_are_resolved() {
    let context = store_context();
    let tolkien = add_author("J. R. R. Tolkien", 81, &context).await;
    let pratchett = add_author("Terry Pratchett", 66, &context).await;
    let hobbit = add_book("The Hobbit", &tolkien, &context).await;
    let silmarillion = add_book("The Silmarillion", &tolkien, &context).await;
    add_book("Mort", &pratchett, &context).await;

    let out = data(
        &format!(r#"{{ author(id: "{tolkien}") {{ name age book {{ id name }} }} }}"#),
        &context,
    ).await;
    let mut books = out["author"]["book"].as_array().unwrap().clone();
    books.sort_by_key(|b| b["id"].as_str().unwrap().to_owned());
    assert_eq!(out["author"]["name"], "J. R. R. Tolkien");
    assert_eq!(out["author"]["age"], 81);
    assert_eq!(books, vec![
        json!({ "id": hobbit, "name": "The Hobbit" }),
        json!({ "id": silmarillion, "name": "The Silmarillion" }),
    ]);

    let out = data(
        &format!(r#"{{ book(id: "{hobbit}") {{ pages author {{ id name }} }} }}"#),
        &context,
    ).await;
    assert_eq!(out, json!({
        "book": {
            "pages": 300,
            "author": { "id": tolkien, "name": "J. R. R. Tolkien" },
        },
    }));
}

#[tokio::test]
async fn author_without_books() {
    let context = store_context();
    let id = add_author("Nobody", 30, &context).await;
    let out = data(&format!(r#"{{ author(id: "{id}") {{ book {{ id }} }} }}"#), &context).await;
    assert_eq!(out, json!({ "author": { "book": [] } }));
}

#[tokio::test]
async fn dangling_author_reference_is_null() {
    let context = store_context();
    let dangling = add_book("Orphan", "12345", &context).await;
    let malformed = add_book("Broken", "not-a-key", &context).await;

    let out = data(
        &format!(r#"{{
            a: book(id: "{dangling}") {{ name author {{ name }} }}
            b: book(id: "{malformed}") {{ name author {{ name }} }}
        }}"#),
        &context,
    ).await;
    assert_eq!(out, json!({
        "a": { "name": "Orphan", "author": null },
        "b": { "name": "Broken", "author": null },
    }));
}

#[tokio::test]
async fn book_exposes_author_id() {
    let context = store_context();
    let author = add_author("Mary Shelley", 53, &context).await;
    let matching = add_book("Frankenstein", &author, &context).await;
    let orphaned = add_book("Lost Manuscript", "98765", &context).await;

    let out = data(
        &format!(r#"{{
            a: book(id: "{matching}") {{ authorID author {{ id }} }}
            b: book(id: "{orphaned}") {{ authorID author {{ id }} }}
        }}"#),
        &context,
    ).await;
    assert_eq!(out, json!({
        "a": { "authorID": author, "author": { "id": author } },
        "b": { "authorID": "98765", "author": null },
    }));

    let out = data("{ books { name authorID } }", &context).await;
    assert_eq!(out, json!({
        "books": [
            { "name": "Frankenstein", "authorID": author },
            { "name": "Lost Manuscript", "authorID": "98765" },
        ],
    }));
}

#[tokio::test]
async fn list_books_and_authors() {
    let context = store_context();
    let a = add_author("Ursula K. Le Guin", 88, &context).await;
    add_book("A Wizard of Earthsea", &a, &context).await;
    add_book("The Dispossessed", &a, &context).await;

    let out = data("{ books { name } authors { name } }", &context).await;
    assert_eq!(out, json!({
        "books": [{ "name": "A Wizard of Earthsea" }, { "name": "The Dispossessed" }],
        "authors": [{ "name": "Ursula K. Le Guin" }],
    }));
}

#[tokio::test]
async fn missing_argument_fails_validation_before_store_access() {
    let context = store_context();
    let result = juniper::execute(
        r#"mutation { addBook(name: "No pages", authorID: "1") { id } }"#,
        None,
        &root_node(),
        &Variables::new(),
        &context,
    ).await;

    assert!(matches!(result, Err(GraphQLError::ValidationError(_))));
    assert_eq!(context.store.num_calls(), 0);
}

#[tokio::test]
async fn wrongly_typed_argument_fails_validation() {
    let context = store_context();
    let result = juniper::execute(
        r#"mutation { addAuthor(name: "Old", age: "very") { id } }"#,
        None,
        &root_node(),
        &Variables::new(),
        &context,
    ).await;

    assert!(matches!(result, Err(GraphQLError::ValidationError(_))));
    assert_eq!(context.store.num_calls(), 0);
}


// ===== Remote spell source ====================================================================

const SPELL_LIST: &str = r#"{
    "count": 3,
    "results": [
        { "index": "acid-arrow", "name": "Acid Arrow", "url": "/api/spells/acid-arrow" },
        { "index": "fire-bolt", "name": "Fire Bolt", "url": "/api/spells/fire-bolt" },
        { "index": "fireball", "name": "Fireball", "url": "/api/spells/fireball" }
    ]
}"#;

fn fake_spell(index: &str) -> Option<Value> {
    let (name, level) = match index {
        "acid-arrow" => ("Acid Arrow", 2),
        "fire-bolt" => ("Fire Bolt", 0),
        "fireball" => ("Fireball", 3),
        _ => return None,
    };

    Some(json!({
        "index": index,
        "name": name,
        "desc": ["First paragraph.", "Second paragraph."],
        "range": "120 feet",
        "components": ["V", "S"],
        "ritual": false,
        "duration": "Instantaneous",
        "concentration": false,
        "casting_time": "1 action",
        "level": level,
        "school": { "index": "evocation", "name": "Evocation", "url": "/api/magic-schools/evocation" },
        "classes": [{ "index": "wizard", "name": "Wizard", "url": "/api/classes/wizard" }],
        "subclasses": [],
        "url": format!("/api/spells/{index}"),
    }))
}

fn fake_response(path: &str) -> Response<Full<Bytes>> {
    let json = |body: String| Response::builder()
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap();
    let status = |code: StatusCode| Response::builder()
        .status(code)
        .body(Full::new(Bytes::new()))
        .unwrap();

    match path.strip_prefix("/api/spells") {
        Some("" | "/") => json(SPELL_LIST.to_owned()),
        Some("/broken") => status(StatusCode::INTERNAL_SERVER_ERROR),
        Some(index) => match fake_spell(index.trim_start_matches('/')) {
            Some(spell) => json(spell.to_string()),
            None => status(StatusCode::NOT_FOUND),
        },
        None => status(StatusCode::NOT_FOUND),
    }
}

/// Starts a local HTTP server mimicking the remote spell API.
async fn fake_remote_api() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let service = hyper::service::service_fn(|req: Request<Incoming>| async move {
                    Ok::<_, Infallible>(fake_response(req.uri().path()))
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

async fn remote_context() -> Context {
    let addr = fake_remote_api().await;
    let config = SpellsConfig {
        source: SpellSourceKind::Remote,
        remote_url: format!("http://{addr}/api").parse().unwrap(),
        proxy: None,
        concurrent_requests: 2,
    };

    Context {
        store: Store::in_memory(),
        spells: SpellSource::Remote(SpellClient::new(&config).unwrap()),
    }
}

#[tokio::test]
async fn remote_spell_by_index() {
    let context = remote_context().await;
    let out = data(r#"{
        spell(id: "fireball") {
            id name description components ritual level school class archetype page
        }
    }"#, &context).await;

    assert_eq!(out, json!({
        "spell": {
            "id": "fireball",
            "name": "Fireball",
            "description": "First paragraph.\nSecond paragraph.",
            "components": "V, S",
            "ritual": "no",
            "level": "3",
            "school": "Evocation",
            "class": "Wizard",
            "archetype": null,
            "page": null,
        },
    }));
    assert_eq!(context.store.num_calls(), 0);
}

#[tokio::test]
async fn remote_unknown_spell_is_null() {
    let context = remote_context().await;
    let out = data(r#"{ spell(id: "wish") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spell": null }));
}

#[tokio::test]
async fn remote_empty_index_is_null() {
    let context = remote_context().await;
    let out = data(r#"{ spell(id: "") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spell": null }));
}

#[tokio::test]
async fn remote_spells_keep_list_order() {
    let context = remote_context().await;
    let out = data("{ spells { id level } }", &context).await;
    assert_eq!(out, json!({
        "spells": [
            { "id": "acid-arrow", "level": "2" },
            { "id": "fire-bolt", "level": "0" },
            { "id": "fireball", "level": "3" },
        ],
    }));

    let out = data(r#"{ spells(name: "Fire") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spells": [{ "name": "Fire Bolt" }, { "name": "Fireball" }] }));
}

#[tokio::test]
async fn remote_failure_is_upstream_error() {
    let context = remote_context().await;
    let (out, errors) = run(r#"{ spell(id: "broken") { name } }"#, &context).await;
    assert_eq!(out, json!({ "spell": null }));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["extensions"], json!({ "kind": "UPSTREAM_UNAVAILABLE" }));
}

#[tokio::test]
async fn add_spell_rejected_for_remote_source() {
    let context = remote_context().await;
    let (out, errors) = run(&add_spell_mutation("Fireball"), &context).await;
    assert_eq!(out, Value::Null);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["extensions"], json!({
        "kind": "INVALID_INPUT",
        "key": "spells-read-only",
    }));
    assert_eq!(context.store.num_calls(), 0);
}

#[tokio::test]
async fn remote_books_still_use_store() {
    let context = remote_context().await;
    let id = add_author("Gary Gygax", 69, &context).await;
    let out = data(&format!(r#"{{ author(id: "{id}") {{ name }} }}"#), &context).await;
    assert_eq!(out, json!({ "author": { "name": "Gary Gygax" } }));
}

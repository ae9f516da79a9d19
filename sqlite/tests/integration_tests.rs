//! Integration tests for the rowmap-sqlite crate.

use chrono::{DateTime, Utc};
use rowmap_core::{
    EnumFieldConverter, FieldDescriptor, IndexDecl, Record, RecordSchema, Registry,
    RegistryBuilder, TextEnum, normalize_index_sql,
};
use rowmap_sqlite::{Store, live_table};
use rusqlite::Connection;

#[derive(Debug, Default, Clone, PartialEq)]
struct Book {
    id: Option<i64>,
    title: String,
    pages: i32,
    rating: Option<f64>,
    cover: Vec<u8>,
    available: bool,
    published: Option<DateTime<Utc>>,
}

impl Record for Book {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new("Book")
            .field(FieldDescriptor::optional(
                "_id",
                |b: &Book| b.id.as_ref(),
                |b, v| b.id = v,
            ))
            .field(
                FieldDescriptor::required("title", |b: &Book| &b.title, |b, v| b.title = v)
                    .indexed(IndexDecl::simple()),
            )
            .field(FieldDescriptor::required(
                "pages",
                |b: &Book| &b.pages,
                |b, v| b.pages = v,
            ))
            .field(FieldDescriptor::optional(
                "rating",
                |b: &Book| b.rating.as_ref(),
                |b, v| b.rating = v,
            ))
            .field(FieldDescriptor::required(
                "cover",
                |b: &Book| &b.cover,
                |b, v| b.cover = v,
            ))
            .field(FieldDescriptor::required(
                "available",
                |b: &Book| &b.available,
                |b, v| b.available = v,
            ))
            .field(FieldDescriptor::optional(
                "published",
                |b: &Book| b.published.as_ref(),
                |b, v| b.published = v,
            ))
    }
}

fn sample_book() -> Book {
    Book {
        id: None,
        title: "Dune".into(),
        pages: 412,
        rating: Some(4.5),
        cover: vec![1, 2, 3, 4],
        available: true,
        published: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000),
    }
}

fn book_registry() -> Registry {
    RegistryBuilder::new().register::<Book>().build()
}

/// Snapshot of every user table and index definition, for before/after
/// comparisons.
fn schema_snapshot(conn: &Connection) -> Vec<(String, Option<String>)> {
    let mut statement = conn
        .prepare(
            "select name, sql from sqlite_master \
             where name not like 'sqlite_%' order by name",
        )
        .unwrap();
    let rows = statement
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap();
    rows.map(|row| row.unwrap()).collect()
}

#[test]
fn test_create_tables_builds_table_and_index() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    Store::new(&conn, &registry).create_tables().unwrap();

    let live = live_table(&conn, "Book").unwrap().unwrap();
    assert_eq!(
        live.columns,
        ["_id", "title", "pages", "rating", "cover", "available", "published"]
    );
    assert!(live.indexes.iter().any(|i| i.name == "Book_title"));
}

#[test]
fn test_upgrade_on_fresh_database_then_reupgrade_is_stable() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);

    store.upgrade_tables().unwrap();
    let before = schema_snapshot(&conn);
    assert!(!before.is_empty());

    // A second upgrade against an up-to-date database changes nothing.
    store.upgrade_tables().unwrap();
    assert_eq!(schema_snapshot(&conn), before);
}

#[test]
fn test_upgrade_adds_missing_columns_and_keeps_data() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "create table 'Book' (_id integer primary key autoincrement, 'title' text);
         insert into 'Book' (title) values ('Dune');",
    )
    .unwrap();

    let registry = book_registry();
    Store::new(&conn, &registry).upgrade_tables().unwrap();

    let live = live_table(&conn, "Book").unwrap().unwrap();
    assert_eq!(
        live.columns,
        ["_id", "title", "pages", "rating", "cover", "available", "published"]
    );

    // The pre-existing row survives; new columns read as NULL.
    let books: Vec<Book> = Store::new(&conn, &registry).query().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dune");
    assert_eq!(books[0].pages, 0);
    assert_eq!(books[0].rating, None);
}

#[test]
fn test_upgrade_recreates_hand_edited_index() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    conn.execute_batch(
        "drop index Book_title;
         create index Book_title on Book ('title' DESC);",
    )
    .unwrap();

    store.upgrade_tables().unwrap();

    let live = live_table(&conn, "Book").unwrap().unwrap();
    let index = live.indexes.iter().find(|i| i.name == "Book_title").unwrap();
    assert_eq!(
        normalize_index_sql(index.sql.as_deref().unwrap()),
        normalize_index_sql("create index Book_title on Book ('title' ASC)")
    );
}

#[test]
fn test_upgrade_keeps_index_whose_name_differs_only_in_case() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    conn.execute_batch(
        "drop index Book_title;
         create index book_title on Book ('title' ASC);",
    )
    .unwrap();

    store.upgrade_tables().unwrap();

    let live = live_table(&conn, "Book").unwrap().unwrap();
    let on_title: Vec<_> = live
        .indexes
        .iter()
        .filter(|i| i.name.eq_ignore_ascii_case("Book_title"))
        .collect();
    assert_eq!(on_title.len(), 1);
}

#[test]
fn test_upgrade_drops_stale_index() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    conn.execute_batch("create index Book_pages on Book ('pages' ASC)")
        .unwrap();

    store.upgrade_tables().unwrap();

    let live = live_table(&conn, "Book").unwrap().unwrap();
    assert!(!live.indexes.iter().any(|i| i.name == "Book_pages"));
    assert!(live.indexes.iter().any(|i| i.name == "Book_title"));
}

#[test]
fn test_drop_all_indices_spares_automatic_ones() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();
    // A unique constraint gives SQLite a reason to create an automatic
    // index.
    conn.execute_batch("create table 'Spare' (_id integer primary key, code text unique)")
        .unwrap();

    store.drop_all_indices().unwrap();
    let live = live_table(&conn, "Book").unwrap().unwrap();
    assert!(live.indexes.is_empty());

    // The automatic index on the unrelated table is untouched.
    let spare = live_table(&conn, "Spare").unwrap().unwrap();
    assert!(spare.indexes.iter().any(|i| i.sql.is_none()));
}

#[test]
fn test_drop_then_recreate_matches_fresh_schema() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);

    store.create_tables().unwrap();
    let fresh = schema_snapshot(&conn);

    store.drop_all_tables().unwrap();
    assert!(schema_snapshot(&conn).is_empty());

    store.create_tables().unwrap();
    assert_eq!(schema_snapshot(&conn), fresh);
}

#[test]
fn test_put_assigns_identifier_and_round_trips() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let mut book = sample_book();
    let id = store.put(&mut book).unwrap();
    assert_eq!(book.id, Some(id));

    let loaded: Book = store.get(id).unwrap().unwrap();
    assert_eq!(loaded, book);
}

#[test]
fn test_put_with_identifier_replaces() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let mut book = sample_book();
    let id = store.put(&mut book).unwrap();

    book.title = "Dune Messiah".into();
    let second = store.put(&mut book).unwrap();
    assert_eq!(second, id);

    let books: Vec<Book> = store.query().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dune Messiah");
}

#[test]
fn test_get_missing_returns_none() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let loaded: Option<Book> = store.get(999).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_delete() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let mut book = sample_book();
    let id = store.put(&mut book).unwrap();

    assert!(store.delete::<Book>(id).unwrap());
    assert!(!store.delete::<Book>(id).unwrap());
    assert!(store.get::<Book>(id).unwrap().is_none());
}

#[test]
fn test_query_where_with_parameters() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = book_registry();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    for (title, pages) in [("Dune", 412), ("Hyperion", 482), ("Novella", 90)] {
        let mut book = Book { title: title.into(), pages, ..sample_book() };
        book.id = None;
        store.put(&mut book).unwrap();
    }

    let long: Vec<Book> = store
        .query_where("pages > ?1", &[&400 as &dyn rusqlite::ToSql])
        .unwrap();
    let mut titles: Vec<_> = long.into_iter().map(|b| b.title).collect();
    titles.sort();
    assert_eq!(titles, ["Dune", "Hyperion"]);
}

#[derive(Debug, Default)]
struct Renamed {
    id: Option<i64>,
    body: String,
}

impl Record for Renamed {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new("Renamed")
            .field(FieldDescriptor::optional(
                "_id",
                |r: &Renamed| r.id.as_ref(),
                |r, v| r.id = v,
            ))
            .field(
                FieldDescriptor::required("body", |r: &Renamed| &r.body, |r, v| r.body = v)
                    .renamed("data1"),
            )
    }
}

#[test]
fn test_renamed_columns_round_trip() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = RegistryBuilder::new()
        .use_column_renames()
        .register::<Renamed>()
        .build();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let live = live_table(&conn, "Renamed").unwrap().unwrap();
    assert_eq!(live.columns, ["_id", "data1"]);

    let mut record = Renamed { id: None, body: "payload".into() };
    let id = store.put(&mut record).unwrap();
    let loaded: Renamed = store.get(id).unwrap().unwrap();
    assert_eq!(loaded.body, "payload");
}

#[derive(Debug, Default, PartialEq)]
enum Format {
    #[default]
    Paperback,
    Hardcover,
}

impl TextEnum for Format {
    fn as_text(&self) -> &'static str {
        match self {
            Format::Paperback => "PAPERBACK",
            Format::Hardcover => "HARDCOVER",
        }
    }

    fn from_text(text: &str) -> Option<Self> {
        match text {
            "PAPERBACK" => Some(Format::Paperback),
            "HARDCOVER" => Some(Format::Hardcover),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Edition {
    id: Option<i64>,
    format: Format,
}

impl Record for Edition {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new("Edition")
            .field(FieldDescriptor::optional(
                "_id",
                |e: &Edition| e.id.as_ref(),
                |e, v| e.id = v,
            ))
            .field(FieldDescriptor::required(
                "format",
                |e: &Edition| &e.format,
                |e, v| e.format = v,
            ))
    }
}

#[test]
fn test_enum_field_stored_as_text() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = RegistryBuilder::new()
        .field_converter::<Format>(EnumFieldConverter::<Format>::new())
        .register::<Edition>()
        .build();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let mut edition = Edition { id: None, format: Format::Hardcover };
    let id = store.put(&mut edition).unwrap();

    let stored: String = conn
        .query_row("select format from Edition where _id = ?1", [id], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, "HARDCOVER");

    let loaded: Edition = store.get(id).unwrap().unwrap();
    assert_eq!(loaded.format, Format::Hardcover);
}

#[derive(Debug, Default)]
struct Shelf {
    id: Option<i64>,
    label: String,
}

#[derive(Debug, Default)]
struct Placement {
    id: Option<i64>,
    shelf: Option<Box<Shelf>>,
}

impl Record for Shelf {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new("Shelf")
            .field(FieldDescriptor::optional(
                "_id",
                |s: &Shelf| s.id.as_ref(),
                |s, v| s.id = v,
            ))
            .field(FieldDescriptor::required(
                "label",
                |s: &Shelf| &s.label,
                |s, v| s.label = v,
            ))
    }
}

impl Record for Placement {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new("Placement")
            .field(FieldDescriptor::optional(
                "_id",
                |p: &Placement| p.id.as_ref(),
                |p, v| p.id = v,
            ))
            .field(FieldDescriptor::optional(
                "shelf",
                |p: &Placement| p.shelf.as_ref(),
                |p, v| p.shelf = v,
            ))
    }
}

#[test]
fn test_record_reference_stores_identifier() {
    let conn = Connection::open_in_memory().unwrap();
    let registry = RegistryBuilder::new()
        .register::<Shelf>()
        .register::<Placement>()
        .build();
    let store = Store::new(&conn, &registry);
    store.create_tables().unwrap();

    let mut shelf = Shelf { id: None, label: "A3".into() };
    let shelf_id = store.put(&mut shelf).unwrap();

    let mut placement = Placement { id: None, shelf: Some(Box::new(shelf)) };
    let placement_id = store.put(&mut placement).unwrap();

    let stored: i64 = conn
        .query_row(
            "select shelf from Placement where _id = ?1",
            [placement_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, shelf_id);

    // Reading back yields a stub carrying only the identifier.
    let loaded: Placement = store.get(placement_id).unwrap().unwrap();
    let stub = loaded.shelf.unwrap();
    assert_eq!(stub.id, Some(shelf_id));
    assert_eq!(stub.label, "");
}

#[test]
fn test_on_disk_database_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.db");
    let registry = book_registry();

    let id = {
        let conn = Connection::open(&path).unwrap();
        let store = Store::new(&conn, &registry);
        store.upgrade_tables().unwrap();
        let mut book = sample_book();
        store.put(&mut book).unwrap()
    };

    let conn = Connection::open(&path).unwrap();
    let store = Store::new(&conn, &registry);
    store.upgrade_tables().unwrap();
    let loaded: Book = store.get(id).unwrap().unwrap();
    assert_eq!(loaded.title, "Dune");
}

use serde::{Deserialize, Serialize};
use service_core::fields;
use service_core::format::fixed_timestamp;
use service_core::repository::{
    BulkItem, Count, Entity, Filter, MemoryDatabase, MemoryStore, QueryOptions, Record, Relation,
    Repository, SoftDelete, StoreError, Target,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Author {
    #[serde(flatten)]
    record: Record,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    books: Option<Vec<Book>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Book {
    #[serde(flatten)]
    record: Record,
    title: String,
    author_id: String,
    pages: i64,
}

impl Entity for Author {
    const COLLECTION: &'static str = "authors";
    const UNIQUE_FIELDS: &'static [&'static str] = &["name"];

    fn relations() -> &'static [Relation] {
        &[Relation {
            name: "books",
            collection: "books",
            local_field: "id",
            foreign_field: "author_id",
        }]
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl Entity for Book {
    const COLLECTION: &'static str = "books";

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

fn repositories() -> (Repository<Author>, Repository<Book>) {
    let db = MemoryDatabase::new();
    (
        Repository::new(Arc::new(MemoryStore::<Author>::new(db.clone()))),
        Repository::new(Arc::new(MemoryStore::<Book>::new(db))),
    )
}

fn author(name: &str) -> Author {
    Author {
        record: Record::new(),
        name: name.to_string(),
        books: None,
    }
}

#[tokio::test]
async fn filter_returns_requested_page_and_meta() {
    let (authors, _) = repositories();
    for i in 0..25 {
        authors
            .create(fields! { "name": format!("author-{:02}", i) })
            .await
            .unwrap();
    }

    let options = QueryOptions::new().sort("name");
    let (page, meta) = authors.filter(Filter::new(), 2, 10, &options).await.unwrap();

    assert_eq!(page.len(), 10);
    assert_eq!(page[0].name, "author-10");
    assert_eq!((meta.page, meta.page_size, meta.total, meta.total_pages), (2, 10, 25, 3));

    let (last, _) = authors.filter(Filter::new(), 3, 10, &options).await.unwrap();
    assert_eq!(last.len(), 5);
}

#[tokio::test]
async fn filter_rejects_offsets_past_the_integer_range() {
    let (authors, _) = repositories();
    authors.create(fields! { "name": "solo" }).await.unwrap();

    let err = authors
        .filter(Filter::new(), u64::MAX, 10, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(ref msg) if msg.contains("out of range")));

    let err = authors
        .filter(Filter::new(), 1, u64::MAX, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));

    let (page, meta) = authors
        .filter(Filter::new(), 1_000_000, 10, &QueryOptions::new())
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(meta.total, 1);
}

#[tokio::test]
async fn filter_rejects_page_zero() {
    let (authors, _) = repositories();
    let err = authors
        .filter(Filter::new(), 0, 10, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));

    let err = authors
        .filter(Filter::new(), 1, 0, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));
}

#[tokio::test]
async fn created_entity_can_be_loaded_by_id() {
    let (authors, _) = repositories();
    let created = authors.create(fields! { "name": "Ursula" }).await.unwrap();

    let loaded = authors
        .get_by_id(created.id(), &QueryOptions::new())
        .await
        .unwrap()
        .expect("author should exist");

    assert_eq!(loaded.id(), created.id());
    assert_eq!(loaded.name, "Ursula");
    assert_eq!(
        fixed_timestamp(&loaded.record.created_at),
        fixed_timestamp(&created.record.created_at)
    );
    assert!(authors.get_by_id(Uuid::new_v4(), &QueryOptions::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_rejects_unknown_fields() {
    let (authors, _) = repositories();
    let err = authors
        .create(fields! { "name": "x", "nickname": "y" })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownField { ref field, .. } if field == "nickname"));
}

#[tokio::test]
async fn get_or_create_reuses_existing() {
    let (authors, _) = repositories();
    let (first, created) = authors.get_or_create(fields! { "name": "Le Guin" }).await.unwrap();
    assert!(created);
    let (second, created) = authors.get_or_create(fields! { "name": "Le Guin" }).await.unwrap();
    assert!(!created);
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn soft_deleted_entities_leave_active_filter() {
    let (authors, _) = repositories();
    let mut gone = authors.create(fields! { "name": "gone" }).await.unwrap();
    authors.create(fields! { "name": "kept" }).await.unwrap();

    gone.soft_delete(authors.store()).await.unwrap();
    assert!(gone.record.deleted_at.is_some());

    let active = authors.all(Author::get_active(), &QueryOptions::new()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "kept");

    let still_there = authors
        .get_by_id(gone.id(), &QueryOptions::new())
        .await
        .unwrap()
        .expect("soft deleted rows remain loadable by id");
    assert!(!still_there.record.is_active());
}

#[tokio::test]
async fn bulk_create_ignoring_conflicts_returns_whole_batch() {
    let (authors, _) = repositories();
    authors.create(fields! { "name": "taken" }).await.unwrap();

    let batch = vec![
        BulkItem::Fields(fields! { "name": "a" }),
        BulkItem::Fields(fields! { "name": "taken" }),
        BulkItem::Fields(fields! { "name": "b" }),
    ];
    let returned = authors.bulk_create(batch, true).await.unwrap();
    assert_eq!(returned.len(), 3);

    let stored = authors.all(Filter::new(), &QueryOptions::new()).await.unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn bulk_create_without_ignoring_conflicts_writes_nothing() {
    let (authors, _) = repositories();
    authors.create(fields! { "name": "taken" }).await.unwrap();

    let batch = vec![
        BulkItem::Entity(author("fresh")),
        BulkItem::Entity(author("taken")),
    ];
    let err = authors.bulk_create(batch, false).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "name"));
    assert_eq!(authors.all(Filter::new(), &QueryOptions::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_create_rejects_mixed_batches() {
    let (authors, _) = repositories();
    let batch = vec![
        BulkItem::Fields(fields! { "name": "a" }),
        BulkItem::Entity(author("b")),
    ];
    let err = authors.bulk_create(batch, false).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));
    assert!(authors.bulk_create(Vec::new(), false).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_assigns_known_fields_only() {
    let (authors, _) = repositories();
    let created = authors.create(fields! { "name": "before" }).await.unwrap();

    let updated = authors
        .update(Target::Id(created.id()), fields! { "name": "after" })
        .await
        .unwrap()
        .expect("author exists");
    assert_eq!(updated.name, "after");
    assert!(updated.record.updated_at >= created.record.updated_at);

    let err = authors
        .update(Target::Entity(updated.clone()), fields! { "age": 3 })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownField { .. }));

    let err = authors
        .update(Target::Entity(updated), fields! { "id": Uuid::new_v4().to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));

    let missing = authors
        .update(Target::Id(Uuid::new_v4()), fields! { "name": "nobody" })
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn relations_expand_and_annotate() {
    let (authors, books) = repositories();
    let prolific = authors.create(fields! { "name": "prolific" }).await.unwrap();
    let idle = authors.create(fields! { "name": "idle" }).await.unwrap();

    for (title, pages) in [("one", 100), ("two", 250)] {
        books
            .create(fields! {
                "title": title,
                "author_id": prolific.id().to_string(),
                "pages": pages,
            })
            .await
            .unwrap();
    }

    let options = QueryOptions::new()
        .sort("name")
        .expand("books")
        .annotate(Count::new("book_count", "books"));
    let loaded = authors.all(Filter::new(), &options).await.unwrap();

    assert_eq!(loaded[0].id(), idle.id());
    assert_eq!(loaded[0].record.annotation("book_count"), Some(0));
    assert_eq!(loaded[0].books.as_ref().map(Vec::len), Some(0));

    assert_eq!(loaded[1].record.annotation("book_count"), Some(2));
    let titles: Vec<_> = loaded[1]
        .books
        .iter()
        .flatten()
        .map(|b| b.title.as_str())
        .collect();
    assert_eq!(titles, vec!["one", "two"]);

    let long = books
        .all(Filter::new().gt("pages", 200), &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(long.len(), 1);

    let err = authors
        .all(Filter::new(), &QueryOptions::new().expand("reviews"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue(_)));
}

#[tokio::test]
async fn filter_existing_ids_keeps_input_order() {
    let (authors, _) = repositories();
    let a = authors.create(fields! { "name": "a" }).await.unwrap();
    let b = authors.create(fields! { "name": "b" }).await.unwrap();
    let ghost = Uuid::new_v4();

    let existing = authors
        .filter_existing_ids(&[b.id(), ghost, a.id()])
        .await
        .unwrap();
    assert_eq!(existing, vec![b.id(), a.id()]);

    let ids = authors
        .all_ids(Filter::new(), &QueryOptions::new().restrict_to("id", [a.id().to_string()]))
        .await
        .unwrap();
    assert_eq!(ids, vec![a.id()]);
}

#[tokio::test]
async fn delete_operations_remove_rows() {
    let (authors, _) = repositories();
    let a = authors.create(fields! { "name": "a" }).await.unwrap();
    let b = authors.create(fields! { "name": "b" }).await.unwrap();
    authors.create(fields! { "name": "c" }).await.unwrap();

    assert!(authors.delete(&a).await.unwrap());
    assert!(!authors.delete_by_id(a.id()).await.unwrap());
    assert!(authors.delete_by_id(b.id()).await.unwrap());
    assert!(!authors.exists(Filter::new().eq("name", "b")).await.unwrap());

    let removed = authors
        .delete_by_filter(Filter::new().eq("name", "c"))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(authors.first(Filter::new(), &QueryOptions::new()).await.unwrap().is_none());
}

//! MongoDB backed store.
//!
//! Entities are stored as plain documents whose `id` is kept in `_id`.
//! Expansion and count annotations run as an aggregation pipeline
//! (`$lookup` + `$addFields`); plain queries use `find`.

use super::entity::Entity;
use super::query::{Condition, Direction, Filter, Op, Query, Sort};
use super::store::Store;
use super::{from_object, to_storable, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions, InsertManyOptions},
    Collection, Database, IndexModel,
};
use serde_json::Value;
use std::marker::PhantomData;

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore<E> {
    collection: Collection<Document>,
    _entity: PhantomData<fn() -> E>,
}

fn field_path(field: &str) -> String {
    if field == "id" {
        "_id".to_string()
    } else {
        field.to_string()
    }
}

fn condition_document(condition: &Condition) -> Result<Document, StoreError> {
    let field = field_path(&condition.field);
    let operator = match condition.op {
        Op::Eq => "$eq",
        Op::Ne => "$ne",
        Op::Gt => "$gt",
        Op::Gte => "$gte",
        Op::Lt => "$lt",
        Op::Lte => "$lte",
        Op::In => "$in",
        Op::IsNull => {
            let null = condition.value.as_bool().unwrap_or(true);
            return Ok(if null {
                doc! { field: Bson::Null }
            } else {
                doc! { field: { "$ne": Bson::Null } }
            });
        }
    };
    let value = bson::to_bson(&condition.value)?;
    let mut clause = Document::new();
    clause.insert(operator, value);
    Ok(doc! { field: clause })
}

fn filter_document(filter: &Filter) -> Result<Document, StoreError> {
    if filter.is_empty() {
        return Ok(Document::new());
    }
    let clauses = filter
        .conditions()
        .iter()
        .map(condition_document)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(doc! { "$and": clauses })
}

fn sort_document(sort: &Sort) -> Option<Document> {
    if sort.is_empty() {
        return None;
    }
    let mut document = Document::new();
    for (field, direction) in sort.keys() {
        let order = match direction {
            Direction::Asc => 1,
            Direction::Desc => -1,
        };
        document.insert(field_path(field), order);
    }
    Some(document)
}

/// Mongo takes skip and limit as signed integers.
fn signed(name: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidValue(format!("{} {} is out of range", name, value)))
}

fn rename_id(document: &mut Document) {
    if let Some(id) = document.remove("_id") {
        document.insert("id", id);
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(failure) => {
            failure.write_concern_error.is_none()
                && failure
                    .write_errors
                    .as_ref()
                    .is_some_and(|errors| errors.iter().all(|e| e.code == DUPLICATE_KEY))
        }
        _ => false,
    }
}

fn failed_writes(error: &mongodb::error::Error) -> usize {
    match error.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => failure.write_errors.as_ref().map_or(0, Vec::len),
        _ => 0,
    }
}

impl<E: Entity> MongoStore<E> {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(E::COLLECTION),
            _entity: PhantomData,
        }
    }

    /// Create the unique indexes declared by the entity, plus one on
    /// `deleted_at` for active-only listings.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        for field in E::UNIQUE_FIELDS {
            let index = IndexModel::builder()
                .keys(doc! { field_path(field): 1 })
                .options(
                    IndexOptions::builder()
                        .name(format!("{}_unique_idx", field))
                        .unique(true)
                        .build(),
                )
                .build();
            self.collection.create_index(index, None).await.map_err(|e| {
                tracing::error!(collection = E::COLLECTION, field, "Failed to create index: {}", e);
                e
            })?;
        }

        let deleted_at = IndexModel::builder()
            .keys(doc! { "deleted_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("deleted_at_idx".to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(deleted_at, None).await?;
        Ok(())
    }

    fn encode(&self, entity: &E) -> Result<Document, StoreError> {
        let mut document = bson::to_document(&Value::Object(to_storable(entity)?))?;
        if let Some(id) = document.remove("id") {
            document.insert("_id", id);
        }
        Ok(document)
    }

    fn decode(&self, mut document: Document, query: &Query) -> Result<E, StoreError> {
        rename_id(&mut document);
        for name in &query.expand {
            if let Ok(related) = document.get_array_mut(name) {
                for item in related.iter_mut() {
                    if let Bson::Document(inner) = item {
                        rename_id(inner);
                    }
                }
            }
        }
        match Bson::Document(document).into_relaxed_extjson() {
            Value::Object(object) => from_object(object),
            other => Err(StoreError::Decode {
                collection: E::COLLECTION,
                reason: format!("unexpected document {}", other),
            }),
        }
    }

    fn lookup_stage(&self, relation_name: &str, alias: &str) -> Result<Document, StoreError> {
        let relation = E::relation(relation_name).ok_or_else(|| {
            StoreError::InvalidValue(format!(
                "{} has no relation {}",
                E::COLLECTION,
                relation_name
            ))
        })?;
        Ok(doc! {
            "$lookup": {
                "from": relation.collection,
                "localField": field_path(relation.local_field),
                "foreignField": field_path(relation.foreign_field),
                "as": alias,
            }
        })
    }

    fn pipeline(&self, query: &Query, filter: Document) -> Result<Vec<Document>, StoreError> {
        let mut stages = vec![doc! { "$match": filter }];
        if let Some(sort) = sort_document(&query.sort) {
            stages.push(doc! { "$sort": sort });
        }
        if query.skip > 0 {
            let skip = signed("skip", query.skip)?;
            stages.push(doc! { "$skip": skip });
        }
        if let Some(limit) = query.limit {
            let limit = signed("limit", limit)?;
            stages.push(doc! { "$limit": limit });
        }

        for name in &query.expand {
            stages.push(self.lookup_stage(name, name)?);
        }

        let mut scratch = Vec::new();
        let mut counts = Document::new();
        for count in &query.annotations {
            let size = if E::relation(&count.field).is_some() {
                let alias = format!("__count_{}", count.name);
                stages.push(self.lookup_stage(&count.field, &alias)?);
                let size = doc! { "$size": format!("${}", alias) };
                scratch.push(alias);
                size
            } else {
                doc! { "$size": { "$ifNull": [format!("${}", count.field), []] } }
            };
            counts.insert(format!("annotations.{}", count.name), size);
        }
        if !counts.is_empty() {
            stages.push(doc! { "$addFields": counts });
        }
        if !scratch.is_empty() {
            stages.push(doc! { "$unset": scratch });
        }

        Ok(stages)
    }
}

#[async_trait]
impl<E: Entity> Store<E> for MongoStore<E> {
    async fn find(&self, query: &Query) -> Result<Vec<E>, StoreError> {
        let filter = filter_document(&query.filter)?;

        let cursor = if query.expand.is_empty() && query.annotations.is_empty() {
            let options = FindOptions::builder()
                .sort(sort_document(&query.sort))
                .skip((query.skip > 0).then_some(query.skip))
                .limit(query.limit.map(|l| signed("limit", l)).transpose()?)
                .build();
            self.collection.find(filter, options).await?
        } else {
            let pipeline = self.pipeline(query, filter)?;
            self.collection.aggregate(pipeline, None).await?
        };

        let documents: Vec<Document> = cursor.try_collect().await?;
        documents
            .into_iter()
            .map(|document| self.decode(document, query))
            .collect()
    }

    async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let filter = filter_document(filter)?;
        Ok(self.collection.count_documents(filter, None).await?)
    }

    async fn insert(&self, entity: &E) -> Result<(), StoreError> {
        let document = self.encode(entity)?;
        match self.collection.insert_one(document, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate {
                collection: E::COLLECTION,
                field: "unique index".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_many(&self, entities: &[E], ignore_conflicts: bool) -> Result<u64, StoreError> {
        if entities.is_empty() {
            return Ok(0);
        }
        let documents = entities
            .iter()
            .map(|entity| self.encode(entity))
            .collect::<Result<Vec<_>, _>>()?;

        let options = InsertManyOptions::builder()
            .ordered(!ignore_conflicts)
            .build();
        match self.collection.insert_many(documents, options).await {
            Ok(result) => Ok(result.inserted_ids.len() as u64),
            Err(e) if ignore_conflicts && is_duplicate_key(&e) => {
                let written = entities.len() - failed_writes(&e);
                tracing::debug!(
                    collection = E::COLLECTION,
                    skipped = failed_writes(&e),
                    "Ignored duplicate rows"
                );
                Ok(written as u64)
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate {
                collection: E::COLLECTION,
                field: "unique index".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, entity: &E) -> Result<bool, StoreError> {
        let document = self.encode(entity)?;
        let result = self
            .collection
            .replace_one(doc! { "_id": entity.id().to_string() }, document, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        let filter = filter_document(filter)?;
        let result = self.collection.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }
}

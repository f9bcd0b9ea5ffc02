//! Repository trait definitions
//!
//! This module provides the generic [`Repository`] trait plus the metadata an
//! entity type declares so a store can persist it: a [`Model`] naming its
//! table, key, timestamp columns and [`Relation`]s.
//!
//! Async methods use RPITIT (Return Position Impl Trait In Traits), so no
//! `async_trait` is needed.
//!
//! # Example
//!
//! ```rust
//! use crudbase::repository::{Entity, Model, Relation};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Order {
//!     #[serde(default)]
//!     id: i64,
//!     user_id: i64,
//!     total_cents: i64,
//! }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     #[serde(default)]
//!     id: i64,
//!     name: String,
//!     #[serde(default, skip_serializing_if = "Vec::is_empty")]
//!     orders: Vec<Order>,
//! }
//!
//! static ORDERS: Model = Model::new("Order", "orders");
//! static USER_RELATIONS: [Relation; 1] = [Relation::has_many("orders", &ORDERS, "user_id")];
//! static USERS: Model = Model::new("User", "users")
//!     .with_timestamps(None, None)
//!     .with_relations(&USER_RELATIONS);
//!
//! impl Entity for Order {
//!     fn model() -> &'static Model { &ORDERS }
//! }
//!
//! impl Entity for User {
//!     fn model() -> &'static Model { &USERS }
//! }
//!
//! assert_eq!(User::model().relation("orders").unwrap().target.table, "orders");
//! ```

use std::fmt;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::conditions_from;
use super::query::{QueryModifier, StoreQuery};
use crate::context::OpContext;
use crate::paging::{PagedResult, PagingQuery};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Persistence metadata for one entity type
///
/// Declared once per entity as a `static` and returned from
/// [`Entity::model`]. Two models are equal when they map the same table.
#[derive(Clone, Copy)]
pub struct Model {
    /// Entity type name used in errors and logs
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// Column stamped when a row is first stored
    pub created_at: Option<&'static str>,
    /// Column stamped on every store
    pub updated_at: Option<&'static str>,
    pub relations: &'static [Relation],
}

impl Model {
    /// Model keyed by `id` with `created_at`/`updated_at` timestamps and no relations
    pub const fn new(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key: "id",
            created_at: Some("created_at"),
            updated_at: Some("updated_at"),
            relations: &[],
        }
    }

    pub const fn with_primary_key(self, primary_key: &'static str) -> Self {
        Self {
            primary_key,
            ..self
        }
    }

    /// Override the timestamp columns; `None` disables stamping
    pub const fn with_timestamps(
        self,
        created_at: Option<&'static str>,
        updated_at: Option<&'static str>,
    ) -> Self {
        Self {
            created_at,
            updated_at,
            ..self
        }
    }

    pub const fn with_relations(self, relations: &'static [Relation]) -> Self {
        Self { relations, ..self }
    }

    /// Look up a declared relation by name
    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Whether `key` names a relation rather than a column
    pub fn is_relation(&self, key: &str) -> bool {
        self.relation(key).is_some()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("relations", &self.relations)
            .finish()
    }
}

/// How a relation's rows are linked to the owning row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Target rows carry `foreign_key` pointing at the owner's primary key
    HasMany { foreign_key: &'static str },
    /// The owner carries `foreign_key` pointing at the target's primary key
    BelongsTo { foreign_key: &'static str },
}

/// A named association between two models
///
/// Preloaded relations appear in the owner's row under `name`: an array of
/// rows for [`RelationKind::HasMany`], one row (or `null`) for
/// [`RelationKind::BelongsTo`].
#[derive(Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub target: &'static Model,
    pub kind: RelationKind,
}

impl Relation {
    pub const fn has_many(
        name: &'static str,
        target: &'static Model,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::HasMany { foreign_key },
        }
    }

    pub const fn belongs_to(
        name: &'static str,
        target: &'static Model,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            target,
            kind: RelationKind::BelongsTo { foreign_key },
        }
    }
}

// Models reference each other through relations, so only the target's table is printed.
impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("target", &self.target.table)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A persisted record type
///
/// The serialized form of an entity is its row: field names are column names,
/// and preloaded relations are fields named after the relation. Generated
/// columns (key, timestamps) should carry `#[serde(default)]` so an entity can
/// be built before the store assigns them.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn model() -> &'static Model;
}

/// Generic repository over one entity and identifier type
///
/// Every operation takes the caller's [`OpContext`], which is forwarded to
/// the store unchanged. NotFound is reported as
/// [`RepositoryErrorKind::NotFound`](super::RepositoryErrorKind::NotFound);
/// every other kind is a store failure.
///
/// # Type Parameters
///
/// - `Id`: The identifier type for the entity (e.g. `i64`, `Uuid`)
/// - `E`: The entity type
pub trait Repository<Id, E>: Send + Sync
where
    Id: Serialize + Send + Sync,
    E: Entity,
{
    /// Fetch one entity by identifier with every direct relation loaded
    fn get(&self, ctx: &OpContext, id: &Id) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// List entities matching a filter DTO
    ///
    /// `total` is the size of the filtered set; paging, when given, only
    /// bounds and orders `items`.
    fn get_list<F>(
        &self,
        ctx: &OpContext,
        filter: &F,
        paging: Option<&PagingQuery>,
    ) -> impl Future<Output = RepositoryResult<PagedResult<E>>> + Send
    where
        F: Serialize + Sync + ?Sized;

    /// Same paging and counting as [`get_list`](Self::get_list) over a
    /// caller-prepared query
    fn get_list_with_query(
        &self,
        ctx: &OpContext,
        query: StoreQuery,
        paging: Option<&PagingQuery>,
    ) -> impl Future<Output = RepositoryResult<PagedResult<E>>> + Send;

    /// Insert one entity, returning it with generated fields filled in
    fn create(&self, ctx: &OpContext, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Insert entities in batches of `batch_size`
    ///
    /// Batches are committed one at a time. When a batch fails, the batches
    /// before it stay committed.
    fn create_many(
        &self,
        ctx: &OpContext,
        entities: Vec<E>,
        batch_size: usize,
    ) -> impl Future<Output = RepositoryResult<Vec<E>>> + Send;

    /// Save the whole entity, cascading to loaded associations
    fn update(&self, ctx: &OpContext, entity: E) -> impl Future<Output = RepositoryResult<E>> + Send;

    /// Remove an entity
    ///
    /// Returns `true` when the row was removed; a row that no longer exists
    /// is reported as NotFound.
    fn delete(&self, ctx: &OpContext, entity: &E)
        -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// A fresh query over every row of the entity's model
    fn query(&self) -> StoreQuery {
        StoreQuery::new(E::model())
    }

    /// A query constrained by a filter DTO
    fn filtered_query<F>(&self, filter: &F) -> RepositoryResult<StoreQuery>
    where
        F: Serialize + ?Sized,
    {
        let conditions = conditions_from(filter).map_err(|e| {
            RepositoryError::conversion(RepositoryOperation::GetList, &e)
                .with_entity_type(E::model().name)
        })?;
        Ok(self.query().filters(conditions))
    }

    /// Augment a query with modifiers, leaving everything already on it intact
    fn query_builder(&self, query: StoreQuery, modifiers: &[QueryModifier]) -> StoreQuery {
        query.modify(modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FilterCondition, RepositoryErrorKind};
    use serde::Deserialize;

    static ITEMS: Model = Model::new("Item", "items").with_timestamps(None, None);
    static TAGS: Model = Model::new("Tag", "tags").with_primary_key("slug");
    static ITEM_RELATIONS: [Relation; 1] = [Relation::has_many("tags", &TAGS, "item_id")];
    static TAGGED_ITEMS: Model = Model::new("Item", "tagged_items").with_relations(&ITEM_RELATIONS);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        id: i64,
    }

    impl Entity for Item {
        fn model() -> &'static Model {
            &ITEMS
        }
    }

    struct Nothing;

    impl Repository<i64, Item> for Nothing {
        async fn get(&self, _ctx: &OpContext, id: &i64) -> RepositoryResult<Item> {
            Err(RepositoryError::not_found("Item", id.to_string()))
        }

        async fn get_list<F>(
            &self,
            _ctx: &OpContext,
            _filter: &F,
            _paging: Option<&PagingQuery>,
        ) -> RepositoryResult<PagedResult<Item>>
        where
            F: Serialize + Sync + ?Sized,
        {
            Ok(PagedResult::default())
        }

        async fn get_list_with_query(
            &self,
            _ctx: &OpContext,
            _query: StoreQuery,
            _paging: Option<&PagingQuery>,
        ) -> RepositoryResult<PagedResult<Item>> {
            Ok(PagedResult::default())
        }

        async fn create(&self, _ctx: &OpContext, entity: Item) -> RepositoryResult<Item> {
            Ok(entity)
        }

        async fn create_many(
            &self,
            _ctx: &OpContext,
            entities: Vec<Item>,
            _batch_size: usize,
        ) -> RepositoryResult<Vec<Item>> {
            Ok(entities)
        }

        async fn update(&self, _ctx: &OpContext, entity: Item) -> RepositoryResult<Item> {
            Ok(entity)
        }

        async fn delete(&self, _ctx: &OpContext, _entity: &Item) -> RepositoryResult<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_model_defaults_and_builders() {
        let model = Model::new("Order", "orders");
        assert_eq!(model.primary_key, "id");
        assert_eq!(model.created_at, Some("created_at"));
        assert_eq!(TAGS.primary_key, "slug");
        assert_eq!(ITEMS.updated_at, None);
    }

    #[test]
    fn test_relation_lookup() {
        let relation = TAGGED_ITEMS.relation("tags").unwrap();
        assert_eq!(relation.target, &TAGS);
        assert_eq!(relation.kind, RelationKind::HasMany { foreign_key: "item_id" });
        assert!(TAGGED_ITEMS.is_relation("tags"));
        assert!(!TAGGED_ITEMS.is_relation("id"));
        // relations print without recursing into the target model
        assert!(format!("{:?}", TAGGED_ITEMS).contains("target: \"tags\""));
    }

    #[test]
    fn test_default_query_helpers() {
        #[derive(Serialize)]
        struct ItemFilter {
            id: Option<i64>,
        }

        let repo = Nothing;
        let query = repo.filtered_query(&ItemFilter { id: Some(4) }).unwrap();
        assert_eq!(query.model, &ITEMS);
        assert_eq!(query.filters, vec![FilterCondition::eq("id", 4_i64)]);

        let query = repo.query_builder(query, &[QueryModifier::join(["owner"])]);
        assert!(query.joins.contains("owner"));
        assert_eq!(query.filters.len(), 1);
    }

    #[test]
    fn test_filtered_query_reports_conversion_errors() {
        let repo = Nothing;
        let err = repo
            .filtered_query(&serde_json::json!({ "id": { "gt": 3 } }))
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::SerializationError);
        assert_eq!(err.entity_type.as_deref(), Some("Item"));
    }

    #[tokio::test]
    async fn test_repository_can_be_implemented() {
        let repo = Nothing;
        let ctx = OpContext::new();
        assert!(repo.get(&ctx, &1).await.unwrap_err().is_not_found());
        assert!(repo.delete(&ctx, &Item { id: 1 }).await.unwrap());
    }
}

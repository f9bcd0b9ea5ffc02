//! Generic repository over a [`Store`](crate::store::Store)
//!
//! This module provides the [`Repository`] trait, its store-backed
//! implementation [`BaseRepository`], and the query vocabulary both use.
//!
//! # Features
//!
//! - **Generic CRUD**: get, filtered list, prepared-query list, create (single
//!   and batched), update with association cascade, delete
//! - **Filtering**: filter DTOs become [`FilterCondition`]s via [`conditions_from`]
//! - **Query augmentation**: [`QueryModifier`]s add preloads and joins to a
//!   prepared [`StoreQuery`]
//! - **Errors**: structured [`RepositoryError`] with operation and kind
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crudbase::context::OpContext;
//! use crudbase::paging::PagingQuery;
//! use crudbase::repository::{BaseRepository, Entity, Model, Repository};
//! use crudbase::store::MemoryStore;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Note {
//!     #[serde(default)]
//!     id: i64,
//!     title: String,
//! }
//!
//! static NOTES: Model = Model::new("Note", "notes").with_timestamps(None, None);
//!
//! impl Entity for Note {
//!     fn model() -> &'static Model { &NOTES }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let repo: BaseRepository<Note, i64, _> = BaseRepository::new(Arc::new(MemoryStore::new()));
//! let ctx = OpContext::new();
//!
//! let note = repo.create(&ctx, Note { title: "hello".into(), ..Default::default() }).await.unwrap();
//! assert!(note.id > 0);
//!
//! let page = repo.get_list(&ctx, &(), Some(&PagingQuery::default())).await.unwrap();
//! assert_eq!(page.total, 1);
//! # });
//! ```

mod base;
mod error;
mod filter;
mod query;
mod traits;

pub use base::BaseRepository;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{conditions_from, FilterCondition, FilterOperator, FilterValue};
pub use query::{QueryModifier, StoreQuery};
pub use traits::{Entity, Model, Relation, RelationKind, Repository, RepositoryResult};

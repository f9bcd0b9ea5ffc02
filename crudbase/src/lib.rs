//! # crudbase
//!
//! Generic data-access and service layers for CRUD backends.
//!
//! ## Features
//!
//! - **Repository**: get, filtered and prepared-query listing with paging and
//!   total counts, single and batched create, cascading update, delete
//! - **Query augmentation**: typed preload/join modifiers, plus a decoder for
//!   untyped option maps
//! - **Service**: DTO-boundary CRUD with projection, hydration and partial update
//! - **Stores**: in-memory store always available; PostgreSQL via `sqlx`
//!   with the `database` feature
//! - **Cancellation**: every call takes an [`OpContext`](context::OpContext)
//!   carrying a cancellation token and optional deadline
//! - **Configuration**: figment-based config (defaults, TOML files, env vars)
//! - **Tracing**: structured JSON logging via `tracing-subscriber`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crudbase::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     #[serde(default)]
//!     id: i64,
//!     name: String,
//!     #[serde(default)]
//!     created_at: Option<String>,
//! }
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct UserDto {
//!     #[serde(default)]
//!     id: i64,
//!     #[serde(default)]
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct UserPatch {
//!     name: Option<String>,
//! }
//!
//! #[derive(Serialize)]
//! struct UserFilter {
//!     name: Option<String>,
//! }
//!
//! static USERS: Model = Model::new("User", "users").with_timestamps(Some("created_at"), None);
//!
//! impl Entity for User {
//!     fn model() -> &'static Model { &USERS }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = Config::default();
//! let repo = BaseRepository::<User, i64, _>::with_config(Arc::new(MemoryStore::new()), &config);
//! let users: BaseService<User, i64, UserDto, NewUser, UserPatch, UserFilter, _> =
//!     BaseService::new(repo);
//!
//! let ctx = OpContext::new();
//! let created = users.create(&ctx, NewUser { name: "ada".into() }).await.unwrap();
//! assert!(created.id > 0);
//!
//! let page = users
//!     .get_list(&ctx, &UserFilter { name: Some("ada".into()) }, Some(&PagingQuery::default()))
//!     .await
//!     .unwrap();
//! assert_eq!(page.total, 1);
//! assert!(users.get(&ctx, &999).await.unwrap().is_none());
//! # });
//! ```

pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod observability;
pub mod paging;
pub mod repository;
pub mod service;
pub mod store;

/// Common imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, PagingConfig, RepositoryConfig};
    pub use crate::context::OpContext;
    pub use crate::convert::{hydrate, merge_onto, project, ConversionError};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::paging::{OrderClause, OrderDirection, PagedResult, PagingQuery};
    pub use crate::repository::{
        BaseRepository, Entity, FilterCondition, Model, QueryModifier, Relation, Repository,
        RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult, StoreQuery,
    };
    pub use crate::service::{BaseService, Service, ServiceError, ServiceResult};
    pub use crate::store::{MemoryStore, Store};

    #[cfg(feature = "database")]
    pub use crate::store::PgStore;
}

pub use config::Config;
pub use error::{Error, Result};

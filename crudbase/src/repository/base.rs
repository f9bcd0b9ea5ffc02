//! Store-backed repository

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::{FilterCondition, FilterOperator, FilterValue};
use super::query::StoreQuery;
use super::traits::{Entity, Repository, RepositoryResult};
use crate::config::{Config, PagingConfig, RepositoryConfig};
use crate::context::OpContext;
use crate::convert::{from_value, to_object, to_value};
use crate::paging::{PagedResult, PagingQuery};
use crate::store::{key_display, primary_key, Row, Store};

/// [`Repository`] implementation for any [`Entity`] over any [`Store`]
///
/// The store handle is injected at construction and shared through an
/// [`Arc`]; cloning a repository clones the handle, not the store.
pub struct BaseRepository<E, Id, S> {
    store: Arc<S>,
    paging: PagingConfig,
    batch_size: usize,
    _marker: PhantomData<fn() -> (E, Id)>,
}

impl<E, Id, S> BaseRepository<E, Id, S>
where
    E: Entity,
    S: Store,
{
    /// Repository with the default paging and batching policy
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, PagingConfig::default(), RepositoryConfig::default())
    }

    /// Repository using the paging and batching policy from `config`
    pub fn with_config(store: Arc<S>, config: &Config) -> Self {
        Self::with_policy(store, config.paging, config.repository)
    }

    pub fn with_policy(store: Arc<S>, paging: PagingConfig, repository: RepositoryConfig) -> Self {
        Self {
            store,
            paging,
            batch_size: repository.batch_size.max(1),
            _marker: PhantomData,
        }
    }

    /// The injected store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn decode(operation: RepositoryOperation, row: Row) -> RepositoryResult<E> {
        from_value(Value::Object(row)).map_err(|e| {
            RepositoryError::conversion(operation, &e).with_entity_type(E::model().name)
        })
    }

    fn encode(operation: RepositoryOperation, entity: &E) -> RepositoryResult<Row> {
        to_object(entity).map_err(|e| {
            RepositoryError::conversion(operation, &e).with_entity_type(E::model().name)
        })
    }
}

impl<E, Id, S> Clone for BaseRepository<E, Id, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paging: self.paging,
            batch_size: self.batch_size,
            _marker: PhantomData,
        }
    }
}

impl<E, Id, S> fmt::Debug for BaseRepository<E, Id, S>
where
    E: Entity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseRepository")
            .field("model", &E::model().name)
            .field("paging", &self.paging)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Report a store failure under the repository operation that caused it
fn relabel(
    from: RepositoryOperation,
    to: RepositoryOperation,
) -> impl Fn(RepositoryError) -> RepositoryError {
    move |err| {
        if err.operation == from {
            err.with_operation(to)
        } else {
            err
        }
    }
}

impl<E, Id, S> Repository<Id, E> for BaseRepository<E, Id, S>
where
    E: Entity,
    Id: Serialize + Send + Sync,
    S: Store,
{
    async fn get(&self, ctx: &OpContext, id: &Id) -> RepositoryResult<E> {
        let model = E::model();
        let key = to_value(id).map_err(|e| {
            RepositoryError::conversion(RepositoryOperation::Get, &e).with_entity_type(model.name)
        })?;
        let value = match FilterValue::from_json(&key) {
            Some(v @ (FilterValue::String(_) | FilterValue::Integer(_))) => v,
            _ => {
                return Err(RepositoryError::validation_failed(
                    RepositoryOperation::Get,
                    format!("{} is not a usable identifier", key),
                )
                .with_entity_type(model.name))
            }
        };

        let query = StoreQuery::new(model)
            .filter(FilterCondition::new(model.primary_key, FilterOperator::Equal, value))
            .preload_all()
            .limit(1);

        let rows = self
            .store
            .find(ctx, &query)
            .await
            .map_err(relabel(RepositoryOperation::GetList, RepositoryOperation::Get))?;

        match rows.into_iter().next() {
            Some(row) => Self::decode(RepositoryOperation::Get, row),
            None => Err(RepositoryError::not_found(model.name, key_display(&key))),
        }
    }

    async fn get_list<F>(
        &self,
        ctx: &OpContext,
        filter: &F,
        paging: Option<&PagingQuery>,
    ) -> RepositoryResult<PagedResult<E>>
    where
        F: Serialize + Sync + ?Sized,
    {
        let query = self.query_builder(self.filtered_query(filter)?, &[]);
        self.get_list_with_query(ctx, query, paging).await
    }

    async fn get_list_with_query(
        &self,
        ctx: &OpContext,
        query: StoreQuery,
        paging: Option<&PagingQuery>,
    ) -> RepositoryResult<PagedResult<E>> {
        let model = E::model();
        if query.model != model {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::GetList,
                format!("query is bound to {}, not {}", query.model.name, model.name),
            )
            .with_entity_type(model.name));
        }

        let window = paging
            .map(|p| p.resolve(self.paging.max_size))
            .transpose()
            .map_err(|e| e.with_entity_type(model.name))?;

        let total = self.store.count(ctx, &query).await?;

        let mut query = query.preload_all();
        if let Some(window) = &window {
            query = query.window(window);
        }

        let rows = self.store.find(ctx, &query).await?;
        let items = rows
            .into_iter()
            .map(|row| Self::decode(RepositoryOperation::GetList, row))
            .collect::<RepositoryResult<Vec<_>>>()?;

        tracing::debug!(
            entity = model.name,
            total,
            returned = items.len(),
            "Listed entities"
        );

        Ok(PagedResult::new(total, items))
    }

    async fn create(&self, ctx: &OpContext, entity: E) -> RepositoryResult<E> {
        let model = E::model();
        let row = Self::encode(RepositoryOperation::Create, &entity)?;
        let stored = self.store.insert(ctx, model, vec![row]).await?;

        match stored.into_iter().next() {
            Some(row) => Self::decode(RepositoryOperation::Create, row),
            None => Err(RepositoryError::database_error(
                RepositoryOperation::Create,
                "store returned no row for the insert",
            )
            .with_entity_type(model.name)),
        }
    }

    async fn create_many(
        &self,
        ctx: &OpContext,
        entities: Vec<E>,
        batch_size: usize,
    ) -> RepositoryResult<Vec<E>> {
        let model = E::model();
        let batch_size = if batch_size == 0 {
            self.batch_size
        } else {
            batch_size
        };

        // every entity is encoded before the first batch is written
        let rows = entities
            .iter()
            .map(|e| Self::encode(RepositoryOperation::CreateMany, e))
            .collect::<RepositoryResult<Vec<_>>>()?;

        let mut created = Vec::with_capacity(rows.len());
        let mut pending = rows.into_iter().peekable();
        let mut batch = 0usize;

        while pending.peek().is_some() {
            let chunk: Vec<Row> = pending.by_ref().take(batch_size).collect();
            let stored = match self.store.insert(ctx, model, chunk).await {
                Ok(stored) => stored,
                Err(err) => {
                    tracing::warn!(
                        entity = model.name,
                        batch,
                        committed = created.len(),
                        error = %err,
                        "Batch insert failed; earlier batches stay committed"
                    );
                    return Err(relabel(
                        RepositoryOperation::Create,
                        RepositoryOperation::CreateMany,
                    )(err));
                }
            };
            for row in stored {
                created.push(Self::decode(RepositoryOperation::CreateMany, row)?);
            }
            tracing::debug!(entity = model.name, batch, committed = created.len(), "Inserted batch");
            batch += 1;
        }

        Ok(created)
    }

    async fn update(&self, ctx: &OpContext, entity: E) -> RepositoryResult<E> {
        let row = Self::encode(RepositoryOperation::Update, &entity)?;
        let stored = self.store.save(ctx, E::model(), row).await?;
        Self::decode(RepositoryOperation::Update, stored)
    }

    async fn delete(&self, ctx: &OpContext, entity: &E) -> RepositoryResult<bool> {
        let model = E::model();
        let row = Self::encode(RepositoryOperation::Delete, entity)?;
        let key = primary_key(model, &row, RepositoryOperation::Delete)?;

        if self.store.delete(ctx, model, &key).await? {
            Ok(true)
        } else {
            Err(RepositoryError::not_found(model.name, key_display(&key))
                .with_operation(RepositoryOperation::Delete))
        }
    }
}

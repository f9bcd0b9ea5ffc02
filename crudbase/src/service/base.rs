//! Repository-backed service

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ServiceResult;
use super::traits::Service;
use crate::context::OpContext;
use crate::convert::{hydrate, merge_onto, project};
use crate::paging::{PagedResult, PagingQuery};
use crate::repository::{Entity, Repository};

/// [`Service`] implementation composing a [`Repository`] with the shape converter
///
/// Reads project entities onto `Dto`; writes hydrate `CreateDto`/`UpdateDto`
/// onto the entity and decode the stored entity back onto a fresh `Dto`, so
/// generated fields (keys, timestamps) reach the caller.
pub struct BaseService<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R> {
    repository: R,
    _marker: PhantomData<fn() -> (E, Id, Dto, CreateDto, UpdateDto, FilterDto)>,
}

impl<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
    BaseService<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
{
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            _marker: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

impl<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R> Clone
    for BaseService<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        Self::new(self.repository.clone())
    }
}

impl<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R> fmt::Debug
    for BaseService<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
where
    R: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseService")
            .field("repository", &self.repository)
            .finish()
    }
}

impl<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
    Service<Id, Dto, CreateDto, UpdateDto, FilterDto>
    for BaseService<E, Id, Dto, CreateDto, UpdateDto, FilterDto, R>
where
    E: Entity + Default,
    Id: Serialize + Send + Sync,
    Dto: Serialize + DeserializeOwned + Default + Send,
    CreateDto: Serialize + Send + Sync,
    UpdateDto: Serialize + Send + Sync,
    FilterDto: Serialize + Sync,
    R: Repository<Id, E>,
{
    async fn get(&self, ctx: &OpContext, id: &Id) -> ServiceResult<Option<Dto>> {
        match self.repository.get(ctx, id).await {
            Ok(entity) => Ok(Some(project(&entity)?)),
            Err(err) if err.is_not_found() => {
                tracing::debug!(entity = E::model().name, "Get matched no record");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_list(
        &self,
        ctx: &OpContext,
        filter: &FilterDto,
        paging: Option<&PagingQuery>,
    ) -> ServiceResult<PagedResult<Dto>> {
        let result = self.repository.get_list(ctx, filter, paging).await?;
        if result.is_empty() {
            return Ok(PagedResult::new(result.total, Vec::new()));
        }
        Ok(result.try_map(|entity| project(&entity))?)
    }

    async fn create(&self, ctx: &OpContext, input: CreateDto) -> ServiceResult<Dto> {
        let entity: E = hydrate(&input)?;
        let stored = self.repository.create(ctx, entity).await?;
        Ok(hydrate(&stored)?)
    }

    async fn update(&self, ctx: &OpContext, id: &Id, input: UpdateDto) -> ServiceResult<Dto> {
        let mut entity = self.repository.get(ctx, id).await?;
        merge_onto(&input, &mut entity)?;
        let stored = self.repository.update(ctx, entity).await?;
        Ok(hydrate(&stored)?)
    }

    async fn delete(&self, ctx: &OpContext, id: &Id) -> ServiceResult<bool> {
        let entity = match self.repository.get(ctx, id).await {
            Ok(entity) => entity,
            Err(err) if err.is_not_found() => {
                tracing::debug!(entity = E::model().name, "Delete matched no record");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        match self.repository.delete(ctx, &entity).await {
            Ok(deleted) => Ok(deleted),
            // removed by someone else between the lookup and the delete
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

//! Service trait definition

use std::future::Future;

use super::error::ServiceResult;
use crate::context::OpContext;
use crate::paging::{PagedResult, PagingQuery};

/// CRUD at the DTO boundary
///
/// # Type Parameters
///
/// - `Id`: identifier type of the underlying entity
/// - `Dto`: read shape returned to callers
/// - `CreateDto`: fields accepted on creation
/// - `UpdateDto`: fields accepted on update; unset fields keep stored values
/// - `FilterDto`: list criteria, each set field an equality (or `IN`) predicate
pub trait Service<Id, Dto, CreateDto, UpdateDto, FilterDto>: Send + Sync
where
    Id: Send + Sync,
    Dto: Send,
    CreateDto: Send,
    UpdateDto: Send,
    FilterDto: Sync,
{
    /// Fetch one record; `None` when it does not exist
    fn get(&self, ctx: &OpContext, id: &Id)
        -> impl Future<Output = ServiceResult<Option<Dto>>> + Send;

    /// List records matching `filter`, optionally paged
    fn get_list(
        &self,
        ctx: &OpContext,
        filter: &FilterDto,
        paging: Option<&PagingQuery>,
    ) -> impl Future<Output = ServiceResult<PagedResult<Dto>>> + Send;

    /// Create a record and return it with store-generated fields
    fn create(&self, ctx: &OpContext, input: CreateDto)
        -> impl Future<Output = ServiceResult<Dto>> + Send;

    /// Partially update the record with identifier `id`
    fn update(
        &self,
        ctx: &OpContext,
        id: &Id,
        input: UpdateDto,
    ) -> impl Future<Output = ServiceResult<Dto>> + Send;

    /// Delete a record; `false` when it does not exist
    fn delete(&self, ctx: &OpContext, id: &Id) -> impl Future<Output = ServiceResult<bool>> + Send;
}

//! Generic service layer over a repository
//!
//! A [`Service`] speaks DTOs: it hydrates create/update inputs onto the
//! entity, delegates to a [`Repository`](crate::repository::Repository), and
//! projects stored entities back out. NotFound on `get` and `delete` becomes
//! `None`/`false`; every other failure is returned as a [`ServiceError`].

mod base;
mod error;
mod traits;

pub use base::BaseService;
pub use error::{ServiceError, ServiceResult};
pub use traits::Service;

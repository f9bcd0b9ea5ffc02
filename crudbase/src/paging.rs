//! Paging descriptors
//!
//! [`PagingQuery`] is what callers send (typically decoded from request query
//! parameters); [`PagedResult`] is what list operations return. A query is
//! resolved into a [`PageWindow`] (offset, limit, order clause) right before it
//! is applied to a store query.
//!
//! ```rust
//! use crudbase::paging::PagingQuery;
//!
//! let query = PagingQuery::default().with_page(1).with_order_by("created_at");
//! let window = query.resolve(1000).unwrap();
//! assert_eq!(window.offset, 25);
//! assert_eq!(window.limit, 25);
//! assert_eq!(window.order.unwrap().to_string(), "created_at asc");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Page size used when the caller does not send one
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Asc,
    /// Sort in descending order (Z-A, 9-0)
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = RepositoryError;

    /// Case-insensitive; an empty string means ascending
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if trimmed.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(RepositoryError::validation_failed(
                RepositoryOperation::GetList,
                format!("Unknown sort direction '{}'", trimmed),
            ))
        }
    }
}

impl OrderDirection {
    /// SQL keyword for this direction
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A single `"<field> <direction>"` ordering
///
/// The field is not checked against the entity here; the store rejects
/// columns it does not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderClause {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Desc)
    }
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// A single page request
///
/// `order_by` names the sort field and `sort_by` the direction, matching the
/// request parameter names (`?page=1&size=50&order_by=name&sort_by=desc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingQuery {
    /// Zero-based page index
    #[serde(default)]
    pub page: i64,

    /// Items per page
    #[serde(default = "default_size")]
    pub size: i64,

    /// Field to sort by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    /// Sort direction, `asc` when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
}

fn default_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PagingQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            order_by: None,
            sort_by: None,
        }
    }
}

impl PagingQuery {
    /// Page 0, size 25, no ordering
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_sort_by(mut self, direction: impl Into<String>) -> Self {
        self.sort_by = Some(direction.into());
        self
    }

    /// The ordering this query asks for, if any
    ///
    /// A missing or blank sort field means no ordering; a blank direction means
    /// ascending.
    pub fn order_clause(&self) -> RepositoryResult<Option<OrderClause>> {
        let Some(field) = self
            .order_by
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
        else {
            return Ok(None);
        };
        let direction = match self.sort_by.as_deref() {
            Some(direction) => direction.parse()?,
            None => OrderDirection::Asc,
        };
        Ok(Some(OrderClause::new(field, direction)))
    }

    /// Validate and turn this query into the offset/limit/order to apply
    ///
    /// Non-positive sizes and negative pages are rejected; sizes above
    /// `max_size` are clamped to it.
    pub fn resolve(&self, max_size: i64) -> RepositoryResult<PageWindow> {
        if self.size <= 0 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::GetList,
                format!("Page size must be positive, got {}", self.size),
            ));
        }
        if self.page < 0 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::GetList,
                format!("Page index must not be negative, got {}", self.page),
            ));
        }
        let limit = if max_size > 0 {
            self.size.min(max_size)
        } else {
            self.size
        };
        let offset = self.page.checked_mul(limit).ok_or_else(|| {
            RepositoryError::validation_failed(
                RepositoryOperation::GetList,
                format!("Page {} is out of range", self.page),
            )
        })?;
        Ok(PageWindow {
            offset,
            limit,
            order: self.order_clause()?,
        })
    }
}

/// Resolved offset, limit and ordering for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<OrderClause>,
}

/// One page of results plus the size of the whole filtered set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Count of the filtered set before paging
    pub total: i64,
    /// Items of the requested page
    pub items: Vec<T>,
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}

impl<T> PagedResult<T> {
    pub fn new(total: i64, items: Vec<T>) -> Self {
        Self { total, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Convert every item, keeping the total
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PagedResult<U>, E> {
        Ok(PagedResult {
            total: self.total,
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryErrorKind;

    #[test]
    fn test_default_paging_query() {
        let query = PagingQuery::default();
        assert_eq!(query.page, 0);
        assert_eq!(query.size, 25);
        assert_eq!(query.order_by, None);
        assert_eq!(query.sort_by, None);
        assert_eq!(query.order_clause().unwrap(), None);
    }

    #[test]
    fn test_deserialize_request_parameters_with_defaults() {
        let query: PagingQuery = serde_json::from_str(r#"{"order_by":"name"}"#).unwrap();
        assert_eq!(query.page, 0);
        assert_eq!(query.size, 25);
        assert_eq!(query.order_clause().unwrap(), Some(OrderClause::asc("name")));
    }

    #[test]
    fn test_order_clause_is_field_then_direction() {
        let query = PagingQuery::new()
            .with_order_by("created_at")
            .with_sort_by("DESC");
        let clause = query.order_clause().unwrap().unwrap();
        assert_eq!(clause.to_string(), "created_at desc");
    }

    #[test]
    fn test_blank_direction_defaults_to_asc() {
        let query = PagingQuery::new().with_order_by("name").with_sort_by("");
        assert_eq!(query.order_clause().unwrap(), Some(OrderClause::asc("name")));
    }

    #[test]
    fn test_direction_without_field_is_ignored() {
        let query = PagingQuery::new().with_sort_by("desc");
        assert_eq!(query.order_clause().unwrap(), None);
    }

    #[test]
    fn test_unknown_direction_is_rejected() {
        let query = PagingQuery::new().with_order_by("name").with_sort_by("sideways");
        let err = query.order_clause().unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_resolve_offsets() {
        let window = PagingQuery::new().with_page(1).resolve(1000).unwrap();
        assert_eq!(window.offset, 25);
        assert_eq!(window.limit, 25);

        let window = PagingQuery::new().with_page(3).with_size(10).resolve(1000).unwrap();
        assert_eq!(window.offset, 30);
        assert_eq!(window.limit, 10);
    }

    #[test]
    fn test_resolve_rejects_non_positive_size() {
        for size in [0, -5] {
            let err = PagingQuery::new().with_size(size).resolve(1000).unwrap_err();
            assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        }
    }

    #[test]
    fn test_resolve_rejects_negative_page() {
        let err = PagingQuery::new().with_page(-1).resolve(1000).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_resolve_clamps_to_max_size() {
        let window = PagingQuery::new().with_page(2).with_size(5000).resolve(100).unwrap();
        assert_eq!(window.limit, 100);
        assert_eq!(window.offset, 200);
    }

    #[test]
    fn test_paged_result_try_map_keeps_total() {
        let page = PagedResult::new(47, vec![1, 2, 3]);
        let mapped: PagedResult<String> = page
            .try_map(|n| Ok::<_, std::convert::Infallible>(n.to_string()))
            .unwrap();
        assert_eq!(mapped.total, 47);
        assert_eq!(mapped.items, vec!["1", "2", "3"]);
    }
}

//! Storage collaborators
//!
//! A [`Store`] executes [`StoreQuery`]s and persists rows for any model. Rows
//! are JSON objects: the serialized form of an entity, with preloaded or
//! cascaded relations nested under the relation name.
//!
//! - [`MemoryStore`]: in-process tables, always available
//! - [`PgStore`]: PostgreSQL through `sqlx` (requires the `database` feature)
//!
//! Stores are injected into repositories at construction; nothing in this
//! crate holds a global handle.

use std::future::Future;
use std::sync::{Arc, LazyLock};

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::context::OpContext;
use crate::repository::{
    Model, Relation, RepositoryError, RepositoryOperation, RepositoryResult, StoreQuery,
};

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::{create_pool, PgStore};

/// One stored record as a JSON object
pub type Row = Map<String, Value>;

/// The capability repositories are built on
///
/// Every method runs under the caller's [`OpContext`]. A failure other than
/// NotFound is a store error and is returned unchanged.
pub trait Store: Send + Sync {
    /// Count rows matching the query's filters and joins (paging is ignored)
    fn count(
        &self,
        ctx: &OpContext,
        query: &StoreQuery,
    ) -> impl Future<Output = RepositoryResult<i64>> + Send;

    /// Fetch rows matching the query, ordered, paged and with relations preloaded
    fn find(
        &self,
        ctx: &OpContext,
        query: &StoreQuery,
    ) -> impl Future<Output = RepositoryResult<Vec<Row>>> + Send;

    /// Insert rows as one unit of work and return them as stored
    ///
    /// Missing keys are generated and timestamp columns stamped. Nested
    /// relation rows are saved along with their owner.
    fn insert(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        rows: Vec<Row>,
    ) -> impl Future<Output = RepositoryResult<Vec<Row>>> + Send;

    /// Insert or fully replace a row, cascading to nested relation rows
    fn save(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        row: Row,
    ) -> impl Future<Output = RepositoryResult<Row>> + Send;

    /// Remove the row with primary key `key`; `false` when there was none
    fn delete(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        key: &Value,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send;
}

impl<S: Store> Store for Arc<S> {
    fn count(
        &self,
        ctx: &OpContext,
        query: &StoreQuery,
    ) -> impl Future<Output = RepositoryResult<i64>> + Send {
        (**self).count(ctx, query)
    }

    fn find(
        &self,
        ctx: &OpContext,
        query: &StoreQuery,
    ) -> impl Future<Output = RepositoryResult<Vec<Row>>> + Send {
        (**self).find(ctx, query)
    }

    fn insert(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        rows: Vec<Row>,
    ) -> impl Future<Output = RepositoryResult<Vec<Row>>> + Send {
        (**self).insert(ctx, model, rows)
    }

    fn save(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        row: Row,
    ) -> impl Future<Output = RepositoryResult<Row>> + Send {
        (**self).save(ctx, model, row)
    }

    fn delete(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        key: &Value,
    ) -> impl Future<Output = RepositoryResult<bool>> + Send {
        (**self).delete(ctx, model, key)
    }
}

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex is valid")
});

/// Reject column and relation names that are not plain identifiers
pub(crate) fn validate_identifier(operation: RepositoryOperation, name: &str) -> RepositoryResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(RepositoryError::validation_failed(
            operation,
            format!("'{}' is not a valid column or relation name", name),
        ))
    }
}

/// Check every identifier a query will use, and that named relations exist
pub(crate) fn validate_query(query: &StoreQuery) -> RepositoryResult<()> {
    for condition in &query.filters {
        validate_identifier(RepositoryOperation::GetList, &condition.field)?;
    }
    if let Some(order) = &query.order {
        validate_identifier(RepositoryOperation::GetList, &order.field)?;
    }
    for name in &query.joins {
        resolve_relation(query.model, name, RepositoryOperation::Join)?;
    }
    for name in query.preload_names() {
        resolve_relation(query.model, name, RepositoryOperation::Preload)?;
    }
    Ok(())
}

pub(crate) fn resolve_relation(
    model: &'static Model,
    name: &str,
    operation: RepositoryOperation,
) -> RepositoryResult<&'static Relation> {
    model.relation(name).ok_or_else(|| {
        RepositoryError::validation_failed(
            operation,
            format!("{} has no relation named '{}'", model.name, name),
        )
        .with_entity_type(model.name)
    })
}

/// Current time in the form timestamp columns are written with
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A key or timestamp the caller left for the store to fill
pub(crate) fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(_) => false,
    }
}

/// Stamp `created_at` (only when unset) and `updated_at` (always)
pub(crate) fn stamp_timestamps(model: &Model, row: &mut Row, now: &str) {
    if let Some(column) = model.created_at {
        if is_unset(row.get(column)) {
            row.insert(column.to_string(), Value::String(now.to_string()));
        }
    }
    if let Some(column) = model.updated_at {
        row.insert(column.to_string(), Value::String(now.to_string()));
    }
}

/// Split relation values off a row, leaving only columns
///
/// Relations whose value is `null` are dropped; they carry nothing to save.
pub(crate) fn split_relations(model: &'static Model, mut row: Row) -> (Row, Vec<(&'static Relation, Value)>) {
    let mut related = Vec::new();
    for relation in model.relations {
        match row.remove(relation.name) {
            None | Some(Value::Null) => {}
            Some(value) => related.push((relation, value)),
        }
    }
    (row, related)
}

/// Keys and foreign keys compare numerically when both sides are numbers
pub(crate) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Whether a nested belongs-to owner disagrees with the row's own foreign key
///
/// A foreign key set on the row wins; the nested owner is then a stale copy
/// (usually the preloaded previous owner) and must not be written back.
pub(crate) fn owner_conflicts(columns: &Row, foreign_key: &str, owner: &Value, target: &Model) -> bool {
    let Some(fk) = columns.get(foreign_key).filter(|v| !is_unset(Some(v))) else {
        return false;
    };
    !owner
        .get(target.primary_key)
        .is_some_and(|key| same_value(key, fk))
}

/// Render a key for error messages without JSON quoting
pub(crate) fn key_display(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Primary key of a row, failing when it is unset
pub(crate) fn primary_key(
    model: &Model,
    row: &Row,
    operation: RepositoryOperation,
) -> RepositoryResult<Value> {
    match row.get(model.primary_key) {
        Some(value) if !is_unset(Some(value)) => Ok(value.clone()),
        _ => Err(RepositoryError::validation_failed(
            operation,
            format!("{} row has no value for '{}'", model.name, model.primary_key),
        )
        .with_entity_type(model.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{FilterCondition, QueryModifier, RepositoryErrorKind};
    use serde_json::json;

    static TEAMS: Model = Model::new("Team", "teams");
    static USER_RELATIONS: [Relation; 1] = [Relation::belongs_to("team", &TEAMS, "team_id")];
    static USERS: Model = Model::new("User", "users").with_relations(&USER_RELATIONS);

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows are objects"),
        }
    }

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier(RepositoryOperation::GetList, "created_at").is_ok());
        assert!(validate_identifier(RepositoryOperation::GetList, "_x1").is_ok());
        for bad in ["", "1abc", "name; drop table users", "a.b", "na me"] {
            let err = validate_identifier(RepositoryOperation::GetList, bad).unwrap_err();
            assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        }
    }

    #[test]
    fn test_validate_query_rejects_unknown_relations() {
        let query = StoreQuery::new(&USERS).modify(&[QueryModifier::join(["projects"])]);
        let err = validate_query(&query).unwrap_err();
        assert_eq!(err.operation, RepositoryOperation::Join);

        let query = StoreQuery::new(&USERS).preload("projects");
        let err = validate_query(&query).unwrap_err();
        assert_eq!(err.operation, RepositoryOperation::Preload);

        let query = StoreQuery::new(&USERS)
            .join("team")
            .preload_all()
            .filter(FilterCondition::eq("name", "x"));
        assert!(validate_query(&query).is_ok());
    }

    #[test]
    fn test_unset_values() {
        assert!(is_unset(None));
        assert!(is_unset(Some(&json!(null))));
        assert!(is_unset(Some(&json!(0))));
        assert!(is_unset(Some(&json!(""))));
        assert!(!is_unset(Some(&json!(7))));
        assert!(!is_unset(Some(&json!("2024-01-01T00:00:00Z"))));
    }

    #[test]
    fn test_stamp_keeps_existing_created_at() {
        let mut r = row(json!({ "created_at": "2020-01-01T00:00:00Z", "updated_at": null }));
        stamp_timestamps(&USERS, &mut r, "2030-01-01T00:00:00Z");
        assert_eq!(r["created_at"], json!("2020-01-01T00:00:00Z"));
        assert_eq!(r["updated_at"], json!("2030-01-01T00:00:00Z"));
    }

    #[test]
    fn test_split_relations() {
        let r = row(json!({ "id": 1, "team": { "id": 2 }, "team_id": null }));
        let (columns, related) = split_relations(&USERS, r);
        assert!(columns.contains_key("team_id"));
        assert!(!columns.contains_key("team"));
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].0.name, "team");
    }

    #[test]
    fn test_owner_conflicts() {
        let owner = json!({ "id": 1, "name": "core" });
        assert!(!owner_conflicts(&row(json!({ "team_id": null })), "team_id", &owner, &TEAMS));
        assert!(!owner_conflicts(&row(json!({ "team_id": 1 })), "team_id", &owner, &TEAMS));
        assert!(owner_conflicts(&row(json!({ "team_id": 2 })), "team_id", &owner, &TEAMS));
        // a new owner without a key never overrides a set foreign key
        assert!(owner_conflicts(
            &row(json!({ "team_id": 2 })),
            "team_id",
            &json!({ "name": "new" }),
            &TEAMS
        ));
        assert!(same_value(&json!(2), &json!(2.0)));
        assert!(!same_value(&json!("2"), &json!(2)));
    }

    #[test]
    fn test_primary_key() {
        let err = primary_key(&USERS, &row(json!({ "id": 0 })), RepositoryOperation::Delete)
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(
            primary_key(&USERS, &row(json!({ "id": 5 })), RepositoryOperation::Delete).unwrap(),
            json!(5)
        );
        assert_eq!(key_display(&json!("abc")), "abc");
        assert_eq!(key_display(&json!(5)), "5");
    }
}

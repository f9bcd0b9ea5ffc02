//! In-process store
//!
//! Tables live in a `tokio::sync::RwLock`. Reads share the lock; a write call
//! holds the write lock and journals every change it makes. When the call
//! fails the journal is replayed backwards, so an `insert` call is
//! all-or-nothing without copying any table.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    is_unset, key_display, now_timestamp, owner_conflicts, primary_key, resolve_relation,
    same_value, split_relations, stamp_timestamps, validate_query, Row, Store,
};
use crate::context::OpContext;
use crate::paging::OrderDirection;
use crate::repository::{
    FilterCondition, FilterOperator, FilterValue, Model, Relation, RelationKind,
    RepositoryError, RepositoryOperation, RepositoryResult, StoreQuery,
};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

impl Table {
    fn position(&self, model: &Model, key: &Value) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get(model.primary_key)
                .is_some_and(|value| same_value(value, key))
        })
    }

}

type Tables = HashMap<&'static str, Table>;

/// One reversible change made by a write call
#[derive(Debug)]
enum Undo {
    Pushed(&'static str),
    Replaced(&'static str, usize, Row),
    NextId(&'static str, i64),
}

/// Changes made so far by one write call, in order
#[derive(Debug, Default)]
struct Journal(Vec<Undo>);

impl Journal {
    fn generate_key(&mut self, name: &'static str, table: &mut Table) -> Value {
        self.0.push(Undo::NextId(name, table.next_id));
        table.next_id += 1;
        Value::from(table.next_id)
    }

    fn observe_key(&mut self, name: &'static str, table: &mut Table, key: &Value) {
        if let Some(n) = key.as_i64() {
            if n > table.next_id {
                self.0.push(Undo::NextId(name, table.next_id));
                table.next_id = n;
            }
        }
    }

    fn push(&mut self, name: &'static str, table: &mut Table, row: Row) {
        table.rows.push(row);
        self.0.push(Undo::Pushed(name));
    }

    fn replace(&mut self, name: &'static str, table: &mut Table, index: usize, row: Row) {
        let previous = std::mem::replace(&mut table.rows[index], row);
        self.0.push(Undo::Replaced(name, index, previous));
    }

    /// Undo every journaled change, newest first
    fn rollback(self, tables: &mut Tables) {
        for undo in self.0.into_iter().rev() {
            match undo {
                Undo::Pushed(name) => {
                    if let Some(table) = tables.get_mut(name) {
                        table.rows.pop();
                    }
                }
                Undo::Replaced(name, index, row) => {
                    if let Some(slot) = tables.get_mut(name).and_then(|t| t.rows.get_mut(index)) {
                        *slot = row;
                    }
                }
                Undo::NextId(name, next_id) => {
                    if let Some(table) = tables.get_mut(name) {
                        table.next_id = next_id;
                    }
                }
            }
        }
    }
}

/// A [`Store`] keeping every table in memory
///
/// Missing integer keys are generated per table, starting at 1. String keys
/// (UUIDs and the like) must be assigned by the caller.
///
/// ```rust
/// use crudbase::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// # let _ = store;
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored for `model`
    pub async fn len(&self, model: &Model) -> usize {
        self.tables
            .read()
            .await
            .get(model.table)
            .map_or(0, |table| table.rows.len())
    }

    pub async fn is_empty(&self, model: &Model) -> bool {
        self.len(model).await == 0
    }
}

impl Store for MemoryStore {
    async fn count(&self, ctx: &OpContext, query: &StoreQuery) -> RepositoryResult<i64> {
        ctx.run(RepositoryOperation::Count, async {
            validate_query(query)?;
            let tables = self.tables.read().await;
            let matched = select(&tables, query)?;
            Ok(i64::try_from(matched.len()).unwrap_or(i64::MAX))
        })
        .await
    }

    async fn find(&self, ctx: &OpContext, query: &StoreQuery) -> RepositoryResult<Vec<Row>> {
        ctx.run(RepositoryOperation::GetList, async {
            validate_query(query)?;
            let tables = self.tables.read().await;
            let mut rows = select(&tables, query)?;

            if let Some(order) = &query.order {
                rows.sort_by(|a, b| {
                    let ordering = sort_cmp(a.get(&order.field), b.get(&order.field));
                    match order.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    }
                });
            }

            let offset = query
                .offset
                .and_then(|o| usize::try_from(o).ok())
                .unwrap_or(0);
            let limit = query
                .limit
                .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(0));

            let preloads = query
                .preload_names()
                .into_iter()
                .map(|name| resolve_relation(query.model, name, RepositoryOperation::Preload))
                .collect::<RepositoryResult<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|row| {
                    let mut out = row.clone();
                    for relation in &preloads {
                        out.insert(
                            relation.name.to_string(),
                            related_value(&tables, query.model, relation, row),
                        );
                    }
                    out
                })
                .collect())
        })
        .await
    }

    async fn insert(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        rows: Vec<Row>,
    ) -> RepositoryResult<Vec<Row>> {
        ctx.run(RepositoryOperation::Create, async move {
            let now = now_timestamp();
            let mut tables = self.tables.write().await;
            let mut journal = Journal::default();

            let mut stored = Vec::with_capacity(rows.len());
            for row in rows {
                match write_row(&mut tables, &mut journal, model, row, &now, false) {
                    Ok(row) => stored.push(row),
                    Err(err) => {
                        journal.rollback(&mut tables);
                        return Err(err);
                    }
                }
            }

            tracing::debug!(table = model.table, rows = stored.len(), "Inserted rows");
            Ok(stored)
        })
        .await
    }

    async fn save(&self, ctx: &OpContext, model: &'static Model, row: Row) -> RepositoryResult<Row> {
        ctx.run(RepositoryOperation::Update, async move {
            let now = now_timestamp();
            let mut tables = self.tables.write().await;
            let mut journal = Journal::default();
            write_row(&mut tables, &mut journal, model, row, &now, true).inspect_err(|_| {
                journal.rollback(&mut tables);
            })
        })
        .await
    }

    async fn delete(
        &self,
        ctx: &OpContext,
        model: &'static Model,
        key: &Value,
    ) -> RepositoryResult<bool> {
        ctx.run(RepositoryOperation::Delete, async {
            let mut tables = self.tables.write().await;
            let Some(table) = tables.get_mut(model.table) else {
                return Ok(false);
            };
            match table.position(model, key) {
                Some(index) => {
                    table.rows.remove(index);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }
}

/// Store one row and its nested relations into `tables`
///
/// With `upsert` an existing row with the same key is replaced (keeping its
/// creation time); without it a duplicate key is an error.
fn write_row(
    tables: &mut Tables,
    journal: &mut Journal,
    model: &'static Model,
    row: Row,
    now: &str,
    upsert: bool,
) -> RepositoryResult<Row> {
    let operation = if upsert {
        RepositoryOperation::Update
    } else {
        RepositoryOperation::Create
    };
    let (mut columns, related) = split_relations(model, row);
    let mut nested = Row::new();

    // owners are stored first so their keys land on this row
    for (relation, value) in &related {
        if let RelationKind::BelongsTo { foreign_key } = relation.kind {
            if owner_conflicts(&columns, foreign_key, value, relation.target) {
                continue;
            }
            let owner_row = expect_row(relation, value)?;
            let owner = write_row(tables, journal, relation.target, owner_row, now, true)?;
            columns.insert(
                foreign_key.to_string(),
                primary_key(relation.target, &owner, operation)?,
            );
            nested.insert(relation.name.to_string(), Value::Object(owner));
        }
    }

    let table = tables.entry(model.table).or_default();
    let key = if is_unset(columns.get(model.primary_key)) {
        let key = journal.generate_key(model.table, table);
        columns.insert(model.primary_key.to_string(), key.clone());
        key
    } else {
        let key = primary_key(model, &columns, operation)?;
        journal.observe_key(model.table, table, &key);
        key
    };

    match table.position(model, &key) {
        Some(index) if upsert => {
            if let Some(column) = model.created_at {
                if is_unset(columns.get(column)) {
                    if let Some(created) = table.rows[index].get(column) {
                        columns.insert(column.to_string(), created.clone());
                    }
                }
            }
            stamp_timestamps(model, &mut columns, now);
            journal.replace(model.table, table, index, columns.clone());
        }
        Some(_) => {
            return Err(RepositoryError::already_exists(model.name, key_display(&key)));
        }
        None => {
            stamp_timestamps(model, &mut columns, now);
            journal.push(model.table, table, columns.clone());
        }
    }

    for (relation, value) in related {
        if let RelationKind::HasMany { foreign_key } = relation.kind {
            let Value::Array(children) = value else {
                return Err(RepositoryError::validation_failed(
                    operation,
                    format!("relation '{}' must hold a list of rows", relation.name),
                )
                .with_entity_type(model.name));
            };
            let mut saved = Vec::with_capacity(children.len());
            for child in &children {
                let mut child = expect_row(relation, child)?;
                child.insert(foreign_key.to_string(), key.clone());
                saved.push(Value::Object(write_row(
                    tables,
                    journal,
                    relation.target,
                    child,
                    now,
                    true,
                )?));
            }
            nested.insert(relation.name.to_string(), Value::Array(saved));
        }
    }

    columns.extend(nested);
    Ok(columns)
}

fn expect_row(relation: &Relation, value: &Value) -> RepositoryResult<Row> {
    match value {
        Value::Object(row) => Ok(row.clone()),
        _ => Err(RepositoryError::validation_failed(
            RepositoryOperation::Update,
            format!("relation '{}' holds a value that is not a row", relation.name),
        )
        .with_entity_type(relation.target.name)),
    }
}

/// Rows of the query's table passing every filter and join
fn select<'t>(tables: &'t Tables, query: &StoreQuery) -> RepositoryResult<Vec<&'t Row>> {
    let Some(table) = tables.get(query.model.table) else {
        return Ok(Vec::new());
    };
    let predicates = query
        .filters
        .iter()
        .map(Predicate::compile)
        .collect::<RepositoryResult<Vec<_>>>()?;
    let joins = query
        .joins
        .iter()
        .map(|name| resolve_relation(query.model, name, RepositoryOperation::Join))
        .collect::<RepositoryResult<Vec<_>>>()?;

    Ok(table
        .rows
        .iter()
        .filter(|row| predicates.iter().all(|p| p.matches(row)))
        .filter(|row| {
            joins
                .iter()
                .all(|relation| has_related(tables, query.model, relation, row))
        })
        .collect())
}

fn has_related(tables: &Tables, model: &Model, relation: &Relation, row: &Row) -> bool {
    match related_value(tables, model, relation, row) {
        Value::Array(rows) => !rows.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

/// The relation's rows for `row`: a list for has-many, one row or null for belongs-to
fn related_value(tables: &Tables, model: &Model, relation: &Relation, row: &Row) -> Value {
    let target = tables.get(relation.target.table);
    match relation.kind {
        RelationKind::HasMany { foreign_key } => {
            let Some(key) = row.get(model.primary_key) else {
                return Value::Array(Vec::new());
            };
            Value::Array(
                target
                    .map(|t| {
                        t.rows
                            .iter()
                            .filter(|child| {
                                child.get(foreign_key).is_some_and(|fk| same_value(fk, key))
                            })
                            .cloned()
                            .map(Value::Object)
                            .collect()
                    })
                    .unwrap_or_default(),
            )
        }
        RelationKind::BelongsTo { foreign_key } => row
            .get(foreign_key)
            .filter(|fk| !fk.is_null())
            .and_then(|fk| {
                let table = target?;
                table
                    .position(relation.target, fk)
                    .map(|index| Value::Object(table.rows[index].clone()))
            })
            .unwrap_or(Value::Null),
    }
}

struct Predicate<'q> {
    condition: &'q FilterCondition,
    pattern: Option<Regex>,
}

impl<'q> Predicate<'q> {
    fn compile(condition: &'q FilterCondition) -> RepositoryResult<Self> {
        let pattern = match (&condition.operator, &condition.value) {
            (FilterOperator::Like, FilterValue::String(pattern)) => {
                Some(like_regex(pattern).map_err(|e| {
                    RepositoryError::validation_failed(
                        RepositoryOperation::GetList,
                        format!("invalid LIKE pattern for '{}': {}", condition.field, e),
                    )
                })?)
            }
            (FilterOperator::Like, _) => {
                return Err(RepositoryError::validation_failed(
                    RepositoryOperation::GetList,
                    format!("LIKE on '{}' needs a string pattern", condition.field),
                ))
            }
            _ => None,
        };
        Ok(Self { condition, pattern })
    }

    fn matches(&self, row: &Row) -> bool {
        let field = row.get(&self.condition.field).filter(|v| !v.is_null());
        let value = &self.condition.value;
        match self.condition.operator {
            FilterOperator::IsNull => field.is_none(),
            FilterOperator::IsNotNull => field.is_some(),
            // comparisons against NULL are never true
            _ if matches!(value, FilterValue::Null) => false,
            operator => {
                let Some(field) = field else {
                    return false;
                };
                match operator {
                    FilterOperator::Equal | FilterOperator::In => equals(field, value),
                    FilterOperator::NotEqual => !equals(field, value),
                    FilterOperator::GreaterThan => compare(field, value) == Some(Ordering::Greater),
                    FilterOperator::GreaterThanOrEqual => matches!(
                        compare(field, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    FilterOperator::LessThan => compare(field, value) == Some(Ordering::Less),
                    FilterOperator::LessThanOrEqual => matches!(
                        compare(field, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    FilterOperator::Like => self
                        .pattern
                        .as_ref()
                        .is_some_and(|re| re.is_match(&text(field))),
                    FilterOperator::IsNull | FilterOperator::IsNotNull => false,
                }
            }
        }
    }
}

/// Translate a SQL LIKE pattern (`%`, `_`, backslash escapes) into an anchored regex
fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out)
}

/// Text form of a column value, as `column::text` would render it
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn equals(field: &Value, value: &FilterValue) -> bool {
    match value {
        FilterValue::String(s) => text(field) == *s,
        FilterValue::Integer(i) => field.as_i64() == Some(*i) || field.as_f64() == Some(*i as f64),
        FilterValue::Float(f) => field.as_f64() == Some(*f),
        FilterValue::Boolean(b) => field.as_bool() == Some(*b),
        FilterValue::StringList(list) => {
            let field = text(field);
            list.iter().any(|s| *s == field)
        }
        FilterValue::IntegerList(list) => field.as_i64().is_some_and(|n| list.contains(&n)),
        FilterValue::Null => false,
    }
}

fn compare(field: &Value, value: &FilterValue) -> Option<Ordering> {
    match value {
        FilterValue::String(s) => Some(text(field).as_str().cmp(s.as_str())),
        FilterValue::Integer(i) => match field.as_i64() {
            Some(n) => Some(n.cmp(i)),
            None => field.as_f64()?.partial_cmp(&(*i as f64)),
        },
        FilterValue::Float(f) => field.as_f64()?.partial_cmp(f),
        FilterValue::Boolean(b) => Some(field.as_bool()?.cmp(b)),
        _ => None,
    }
}

/// Ascending order with nulls last
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            },
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => text(a).cmp(&text(b)),
        },
    }
}

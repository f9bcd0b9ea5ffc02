//! Prepared store queries and query modifiers
//!
//! A [`StoreQuery`] is bound to one [`Model`] and carries everything a store
//! needs to execute a read: filter conditions, relations to eager-load,
//! relations to join, ordering and the page window. Repositories build one per
//! call; callers can prepare their own and hand it to
//! [`Repository::get_list_with_query`](super::Repository::get_list_with_query).
//!
//! [`QueryModifier`]s augment a query after it is built. Applying modifiers is
//! additive (nothing already on the query is removed) and commutative, because
//! relation names are kept in sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::FilterCondition;
use super::traits::Model;
use crate::paging::{OrderClause, PageWindow};

/// A read query against one model
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    /// Model the query is bound to
    pub model: &'static Model,
    /// Conditions combined with AND
    pub filters: Vec<FilterCondition>,
    /// Relations to eager-load into each returned row
    pub preloads: BTreeSet<String>,
    /// Eager-load every relation declared on the model
    pub preload_all: bool,
    /// Relations the returned rows must be joined with
    pub joins: BTreeSet<String>,
    pub order: Option<OrderClause>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl StoreQuery {
    /// An unfiltered, unordered query over every row of `model`
    pub fn new(model: &'static Model) -> Self {
        Self {
            model,
            filters: Vec::new(),
            preloads: BTreeSet::new(),
            preload_all: false,
            joins: BTreeSet::new(),
            order: None,
            offset: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    #[must_use]
    pub fn filters(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.filters.extend(conditions);
        self
    }

    #[must_use]
    pub fn preload(mut self, relation: impl Into<String>) -> Self {
        self.preloads.insert(relation.into());
        self
    }

    #[must_use]
    pub fn preload_all(mut self) -> Self {
        self.preload_all = true;
        self
    }

    #[must_use]
    pub fn join(mut self, relation: impl Into<String>) -> Self {
        self.joins.insert(relation.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderClause) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply a resolved page window
    ///
    /// An ordering already on the query is only replaced when the window
    /// carries one.
    #[must_use]
    pub fn window(mut self, window: &PageWindow) -> Self {
        self.offset = Some(window.offset);
        self.limit = Some(window.limit);
        if let Some(order) = &window.order {
            self.order = Some(order.clone());
        }
        self
    }

    /// Apply modifiers in order
    #[must_use]
    pub fn modify(self, modifiers: &[QueryModifier]) -> Self {
        modifiers.iter().fold(self, |query, m| m.apply(query))
    }

    /// Relations that will be eager-loaded, resolved against the model
    pub fn preload_names(&self) -> Vec<&str> {
        if self.preload_all {
            let mut names: Vec<&str> = self.model.relations.iter().map(|r| r.name).collect();
            for extra in &self.preloads {
                if !names.contains(&extra.as_str()) {
                    names.push(extra);
                }
            }
            names
        } else {
            self.preloads.iter().map(String::as_str).collect()
        }
    }
}

/// A typed query augmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryModifier {
    /// Eager-load the named relations
    Preload(Vec<String>),
    /// Join the named relations
    Join(Vec<String>),
}

impl QueryModifier {
    pub fn preload<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Preload(relations.into_iter().map(Into::into).collect())
    }

    pub fn join<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Join(relations.into_iter().map(Into::into).collect())
    }

    /// Read modifiers out of an untyped options map
    ///
    /// `preload` must hold an array of names; `join` holds one name or an
    /// array. Non-string names, unknown keys and non-object options are
    /// ignored.
    ///
    /// ```rust
    /// use crudbase::repository::QueryModifier;
    ///
    /// let options = serde_json::json!({ "preload": ["orders"], "join": "team", "x": 1 });
    /// let modifiers = QueryModifier::from_options(&options);
    /// assert!(modifiers.contains(&QueryModifier::preload(["orders"])));
    /// assert!(modifiers.contains(&QueryModifier::join(["team"])));
    /// assert_eq!(modifiers.len(), 2);
    /// ```
    pub fn from_options(options: &Value) -> Vec<Self> {
        let Some(map) = options.as_object() else {
            return Vec::new();
        };

        let mut modifiers = Vec::new();
        for (key, value) in map {
            match (key.as_str(), value) {
                ("preload", Value::Array(names)) => {
                    modifiers.push(Self::Preload(string_items(names)));
                }
                ("join", Value::Array(names)) => {
                    modifiers.push(Self::Join(string_items(names)));
                }
                ("join", Value::String(name)) => {
                    modifiers.push(Self::Join(vec![name.clone()]));
                }
                _ => {}
            }
        }
        modifiers
    }

    /// Add this modifier's relations to `query`
    #[must_use]
    pub fn apply(&self, mut query: StoreQuery) -> StoreQuery {
        match self {
            Self::Preload(names) => query.preloads.extend(names.iter().cloned()),
            Self::Join(names) => query.joins.extend(names.iter().cloned()),
        }
        query
    }
}

fn string_items(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Model, Relation};

    static TEAMS: Model = Model::new("Team", "teams");
    static PROJECTS: Model = Model::new("Project", "projects");
    static USER_RELATIONS: [Relation; 2] = [
        Relation::belongs_to("team", &TEAMS, "team_id"),
        Relation::has_many("projects", &PROJECTS, "owner_id"),
    ];
    static USERS: Model = Model::new("User", "users").with_relations(&USER_RELATIONS);

    #[test]
    fn test_modifiers_are_commutative() {
        let preload = QueryModifier::preload(["A", "B"]);
        let join = QueryModifier::join(["C"]);

        let one = StoreQuery::new(&USERS).modify(&[preload.clone(), join.clone()]);
        let two = StoreQuery::new(&USERS).modify(&[join, preload]);

        assert_eq!(one, two);
        assert_eq!(one.preload_names(), vec!["A", "B"]);
        assert_eq!(one.joins.iter().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_modifiers_are_additive() {
        let query = StoreQuery::new(&USERS)
            .filter(FilterCondition::eq("status", "active"))
            .order_by(OrderClause::desc("name"))
            .limit(10)
            .preload("team")
            .modify(&[QueryModifier::preload(["projects"])]);

        assert_eq!(query.filters.len(), 1);
        assert_eq!(query.order, Some(OrderClause::desc("name")));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.preload_names(), vec!["projects", "team"]);
    }

    #[test]
    fn test_from_options_join_forms() {
        let single = QueryModifier::from_options(&serde_json::json!({ "join": "team" }));
        assert_eq!(single, vec![QueryModifier::join(["team"])]);

        let many = QueryModifier::from_options(&serde_json::json!({ "join": ["team", "projects"] }));
        assert_eq!(many, vec![QueryModifier::join(["team", "projects"])]);
    }

    #[test]
    fn test_from_options_ignores_bad_shapes() {
        assert!(QueryModifier::from_options(&serde_json::json!(null)).is_empty());
        assert!(QueryModifier::from_options(&serde_json::json!(["preload"])).is_empty());
        // preload only accepts an array
        assert!(QueryModifier::from_options(&serde_json::json!({ "preload": "team" })).is_empty());
        assert!(QueryModifier::from_options(&serde_json::json!({ "where": "1=1" })).is_empty());

        let mixed = QueryModifier::from_options(&serde_json::json!({ "preload": ["team", 3] }));
        assert_eq!(mixed, vec![QueryModifier::preload(["team"])]);
    }

    #[test]
    fn test_preload_all_expands_model_relations() {
        let query = StoreQuery::new(&USERS).preload_all();
        assert_eq!(query.preload_names(), vec!["team", "projects"]);
    }

    #[test]
    fn test_window_keeps_existing_order_without_sort_field() {
        let window = PageWindow {
            offset: 50,
            limit: 25,
            order: None,
        };
        let query = StoreQuery::new(&USERS)
            .order_by(OrderClause::asc("id"))
            .window(&window);
        assert_eq!(query.offset, Some(50));
        assert_eq!(query.limit, Some(25));
        assert_eq!(query.order, Some(OrderClause::asc("id")));
    }

    #[test]
    fn test_modifier_serde_shape() {
        let json = serde_json::to_value(QueryModifier::preload(["team"])).unwrap();
        assert_eq!(json, serde_json::json!({ "preload": ["team"] }));
    }
}

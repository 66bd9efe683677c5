//! Immutable query scopes.
//!
//! A [`Scope`] describes a set of rows in one table: equality conditions,
//! an optional ordering term and an optional limit. Builder methods return
//! a new scope and never touch the receiver, so scopes can be shared and
//! extended freely.
//!
//! # Example
//!
//! ```
//! use litemodel_core::{Attributes, Scope, Value};
//!
//! let base = Scope::new("events");
//! let scope = base
//!     .filter(Attributes::new().with("name", "x"))
//!     .order("id desc")
//!     .limit(1);
//!
//! assert_eq!(scope.predicate(), "WHERE name = ? ORDER BY id desc LIMIT 1");
//! assert_eq!(scope.predicate_values(), vec![Value::from("x")]);
//! assert!(!base.has_predicate());
//! ```

use std::sync::{Arc, OnceLock};

use crate::value::{Attributes, Value};

/// Conditions, ordering and limit for one table.
#[derive(Debug, Clone)]
pub struct Scope {
    table: Arc<str>,
    conditions: Arc<Attributes>,
    order: Option<Arc<str>>,
    limit: Option<u64>,
    predicate: OnceLock<String>,
}

impl Scope {
    /// Creates an unconstrained scope over `table`.
    pub fn new(table: impl Into<Arc<str>>) -> Self {
        Self {
            table: table.into(),
            conditions: Arc::new(Attributes::new()),
            order: None,
            limit: None,
            predicate: OnceLock::new(),
        }
    }

    /// Returns a scope with `conditions` merged into the existing
    /// equality conditions. Later values win for repeated columns.
    #[doc(alias = "where")]
    pub fn filter(&self, conditions: Attributes) -> Scope {
        let conditions = if self.conditions.is_empty() {
            Arc::new(conditions)
        } else if conditions.is_empty() {
            Arc::clone(&self.conditions)
        } else {
            Arc::new(self.conditions.merged(&conditions))
        };
        self.rebuild(conditions, self.order.clone(), self.limit)
    }

    /// Returns a scope ordered by `term`.
    ///
    /// The term is written into the SQL verbatim and must come from trusted
    /// code, never from user input.
    pub fn order(&self, term: impl Into<Arc<str>>) -> Scope {
        self.rebuild(Arc::clone(&self.conditions), Some(term.into()), self.limit)
    }

    pub fn limit(&self, limit: u64) -> Scope {
        self.rebuild(Arc::clone(&self.conditions), self.order.clone(), Some(limit))
    }

    /// Returns a scope with the same conditions and no ordering or limit.
    ///
    /// Bulk `UPDATE` and `DELETE` statements are built from this, since
    /// SQLite rejects `ORDER BY` and `LIMIT` on them unless compiled with
    /// `SQLITE_ENABLE_UPDATE_DELETE_LIMIT`.
    pub fn conditions_only(&self) -> Scope {
        if self.order.is_none() && self.limit.is_none() {
            return self.clone();
        }
        self.rebuild(Arc::clone(&self.conditions), None, None)
    }

    fn rebuild(&self, conditions: Arc<Attributes>, order: Option<Arc<str>>, limit: Option<u64>) -> Scope {
        Scope {
            table: Arc::clone(&self.table),
            conditions,
            order,
            limit,
            predicate: OnceLock::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &Attributes {
        &self.conditions
    }

    pub fn ordering(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Whether any of the `WHERE`, `ORDER BY` or `LIMIT` segments is present.
    pub fn has_predicate(&self) -> bool {
        !self.conditions.is_empty() || self.order.is_some() || self.limit.is_some()
    }

    /// Renders the `WHERE ... ORDER BY ... LIMIT ...` tail of a statement.
    ///
    /// Rendered once per scope and cached.
    pub fn predicate(&self) -> &str {
        self.predicate.get_or_init(|| {
            let mut segments = Vec::with_capacity(3);
            if !self.conditions.is_empty() {
                let clauses: Vec<String> = self
                    .conditions
                    .names()
                    .map(|column| format!("{column} = ?"))
                    .collect();
                segments.push(format!("WHERE {}", clauses.join(" AND ")));
            }
            if let Some(order) = &self.order {
                segments.push(format!("ORDER BY {order}"));
            }
            if let Some(limit) = self.limit {
                segments.push(format!("LIMIT {limit}"));
            }
            segments.join(" ")
        })
    }

    /// Values bound to the placeholders of [`predicate`](Self::predicate),
    /// in the same column order.
    pub fn predicate_values(&self) -> Vec<Value> {
        self.conditions.values().cloned().collect()
    }

    /// Appends the predicate to `head`, separated by a space when present.
    pub fn statement(&self, head: &str) -> String {
        if self.has_predicate() {
            format!("{head} {}", self.predicate())
        } else {
            head.to_string()
        }
    }
}

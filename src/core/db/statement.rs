/// Statement Assembly Module
///
/// Builds the INSERT and UPDATE statements issued by the query helpers.
/// Assembly is pure: the SQL text and its bindings can be inspected without
/// a connection.
///
/// ## Raw expressions
///
/// A field whose value is `SqlValue::Raw` is written into the SQL verbatim
/// instead of being bound. A `SqlValue::Text` spelling `now()` (any case) is
/// written as `NOW()` in INSERT values and UPDATE SET lists; in a WHERE
/// list it is an ordinary string and is bound.

use super::value::{BindKind, SqlValue};
use crate::core::{DbError, Result};
use rusqlite::ToSql;
use std::collections::HashSet;

/// One named placeholder and the value bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Placeholder including its `:` prefix
    pub name: String,
    pub value: SqlValue,
    pub kind: BindKind,
}

/// Generated SQL text together with its bindings, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

impl BuiltStatement {
    /// Finds a binding by placeholder, with or without the `:` prefix.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.bindings
            .iter()
            .find(|b| b.name.strip_prefix(':') == Some(name))
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    pub(crate) fn named_refs(&self) -> Vec<(&str, &dyn ToSql)> {
        self.bindings
            .iter()
            .map(|b| (b.name.as_str(), &b.value as &dyn ToSql))
            .collect()
    }
}

/// The SQL a field value contributes when it is not bound.
fn raw_sql(value: &SqlValue, allow_now_literal: bool) -> Option<&str> {
    match value {
        SqlValue::Raw(expr) => Some(expr.as_str()),
        v if allow_now_literal && v.is_now_literal() => Some("NOW()"),
        _ => None,
    }
}

/// Claims `base` as a placeholder, or the first free `base_2`, `base_3`, ...
fn unique_placeholder(used: &mut HashSet<String>, base: &str) -> String {
    let mut name = base.to_string();
    let mut suffix = 2;
    while used.contains(&name) {
        name = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    used.insert(name.clone());
    name
}

/// Builds `INSERT INTO table (cols) VALUES (...)` with columns in slice order.
pub fn build_insert(table: &str, fields: &[(&str, SqlValue)]) -> Result<BuiltStatement> {
    if fields.is_empty() {
        return Err(DbError::Query(format!(
            "Insert into {} requires at least one field",
            table
        )));
    }

    let mut columns = Vec::with_capacity(fields.len());
    let mut values = Vec::with_capacity(fields.len());
    let mut bindings = Vec::new();
    let mut used = HashSet::new();

    for (field, value) in fields {
        columns.push(field.to_string());
        match raw_sql(value, true) {
            Some(expr) => values.push(expr.to_string()),
            None => {
                let name = unique_placeholder(&mut used, &format!(":{}", field));
                values.push(name.clone());
                bindings.push(Binding {
                    name,
                    value: value.clone(),
                    kind: BindKind::Inferred,
                });
            }
        }
    }

    Ok(BuiltStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            values.join(", ")
        ),
        bindings,
    })
}

/// Builds `UPDATE table SET f = :f, ... WHERE w = :w AND ...`.
///
/// SET bindings carry the kind of their value; WHERE bindings are left to
/// inference. Placeholder names never repeat: a WHERE field whose `:<field>`
/// is already taken is bound as `:where_<field>`, and any name still taken
/// gets a numeric suffix (`:status_2`, `:where_status_2`).
pub fn build_update(
    table: &str,
    fields: &[(&str, SqlValue)],
    where_fields: &[(&str, SqlValue)],
) -> Result<BuiltStatement> {
    if fields.is_empty() {
        return Err(DbError::Query(format!(
            "Update of {} requires at least one field to set",
            table
        )));
    }
    if where_fields.is_empty() {
        return Err(DbError::Query(format!(
            "Update of {} requires at least one WHERE field",
            table
        )));
    }

    let mut bindings = Vec::new();
    let mut used = HashSet::new();

    let mut set_parts = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        match raw_sql(value, true) {
            Some(expr) => set_parts.push(format!("{} = {}", field, expr)),
            None => {
                let name = unique_placeholder(&mut used, &format!(":{}", field));
                set_parts.push(format!("{} = {}", field, name));
                bindings.push(Binding {
                    name,
                    value: value.clone(),
                    kind: value.bind_kind().unwrap_or(BindKind::Inferred),
                });
            }
        }
    }

    let mut where_parts = Vec::with_capacity(where_fields.len());
    for (field, value) in where_fields {
        match raw_sql(value, false) {
            Some(expr) => where_parts.push(format!("{} = {}", field, expr)),
            None => {
                let plain = format!(":{}", field);
                let name = if used.contains(&plain) {
                    unique_placeholder(&mut used, &format!(":where_{}", field))
                } else {
                    unique_placeholder(&mut used, &plain)
                };
                where_parts.push(format!("{} = {}", field, name));
                bindings.push(Binding {
                    name,
                    value: value.clone(),
                    kind: BindKind::Inferred,
                });
            }
        }
    }

    Ok(BuiltStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            set_parts.join(", "),
            where_parts.join(" AND ")
        ),
        bindings,
    })
}

/// Parameter Module
///
/// Positional (`?`, `?1`) and named (`:name`) parameter sets for the query
/// helpers.

use super::value::SqlValue;
use rusqlite::ToSql;

/// Parameters bound to a statement before execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<SqlValue>),
    /// Names are stored with their prefix (`:`, `@` or `$`)
    Named(Vec<(String, SqlValue)>),
}

impl Params {
    /// Builds a named set, adding a `:` prefix to bare names.
    pub fn named<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<SqlValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (placeholder_name(k.as_ref()), v.into()))
                .collect(),
        )
    }

    pub fn positional<V, I>(values: I) -> Self
    where
        V: Into<SqlValue>,
        I: IntoIterator<Item = V>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(v) => v.is_empty(),
            Params::Named(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(v) => v.len(),
            Params::Named(v) => v.len(),
        }
    }

    /// Named parameters as the slice shape rusqlite binds by name.
    pub(crate) fn named_refs(&self) -> Vec<(&str, &dyn ToSql)> {
        match self {
            Params::Named(pairs) => pairs
                .iter()
                .map(|(k, v)| (k.as_str(), v as &dyn ToSql))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Returns `name` as a named placeholder, keeping an existing prefix.
pub fn placeholder_name(name: &str) -> String {
    if name.starts_with(':') || name.starts_with('@') || name.starts_with('$') {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(values: Vec<SqlValue>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[SqlValue]> for Params {
    fn from(values: &[SqlValue]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[SqlValue; N]> for Params {
    fn from(values: [SqlValue; N]) -> Self {
        Params::Positional(values.into())
    }
}

impl From<Vec<(&str, SqlValue)>> for Params {
    fn from(pairs: Vec<(&str, SqlValue)>) -> Self {
        Params::named(pairs)
    }
}

impl From<&[(&str, SqlValue)]> for Params {
    fn from(pairs: &[(&str, SqlValue)]) -> Self {
        Params::named(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }
}

impl<const N: usize> From<[(&str, SqlValue); N]> for Params {
    fn from(pairs: [(&str, SqlValue); N]) -> Self {
        Params::named(pairs)
    }
}

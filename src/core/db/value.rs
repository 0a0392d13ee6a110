/// Value Module
///
/// The semantic value type used for parameters, insert/update fields and
/// result cells, plus its conversions to and from the SQLite driver.

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;
use std::fmt;

/// A value passed to or read from the database.
///
/// `Raw` is a SQL fragment that is spliced into generated SQL unescaped
/// (e.g. `NOW()`); it is never bound as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
    Raw(String),
}

/// The semantic type a placeholder is bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindKind {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
    Null,
    /// Left to the driver's default inference from the value itself
    Inferred,
}

impl SqlValue {
    /// Builds a raw SQL expression.
    pub fn raw(expr: impl Into<String>) -> Self {
        SqlValue::Raw(expr.into())
    }

    /// The server-side current timestamp expression.
    pub fn now() -> Self {
        SqlValue::Raw("NOW()".to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, SqlValue::Raw(_))
    }

    /// True for a text value spelling `now()` in any letter case.
    ///
    /// Callers that predate `SqlValue::Raw` request the current timestamp
    /// this way.
    pub fn is_now_literal(&self) -> bool {
        match self {
            SqlValue::Text(s) => s.eq_ignore_ascii_case("now()"),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(f) => Some(*f),
            SqlValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The bind type matching this value's variant. `Raw` has none.
    pub fn bind_kind(&self) -> Option<BindKind> {
        match self {
            SqlValue::Null => Some(BindKind::Null),
            SqlValue::Integer(_) => Some(BindKind::Integer),
            SqlValue::Real(_) => Some(BindKind::Real),
            SqlValue::Bool(_) => Some(BindKind::Boolean),
            SqlValue::Text(_) => Some(BindKind::Text),
            SqlValue::Blob(_) => Some(BindKind::Blob),
            SqlValue::Raw(_) => None,
        }
    }

    /// Converts a driver cell into an owned value. Text that is not valid
    /// UTF-8 comes back as `Blob` with its bytes untouched.
    pub fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(s) => SqlValue::Text(s.to_string()),
                Err(_) => SqlValue::Blob(t.to_vec()),
            },
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Integer(i) => serde_json::Value::from(*i),
            SqlValue::Real(f) => serde_json::Value::from(*f),
            SqlValue::Bool(b) => serde_json::Value::from(*b),
            SqlValue::Text(s) | SqlValue::Raw(s) => serde_json::Value::from(s.as_str()),
            SqlValue::Blob(b) => serde_json::Value::from(b.clone()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Text(s) | SqlValue::Raw(s) => write!(f, "{}", s),
            SqlValue::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            SqlValue::Raw(expr) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    format!("raw SQL expression `{}` cannot be bound as a parameter", expr).into(),
                ))
            }
        })
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::Integer(v as i64)
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Real(v as f64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

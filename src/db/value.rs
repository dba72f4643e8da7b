use std::collections::BTreeMap;

/// Declared kind of a parameter, kept on NULLs so PostgreSQL receives a typed null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlKind {
    Integer,
    Real,
    Text,
    Bool,
}

/// A positional parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlKind),
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    pub fn kind(&self) -> SqlKind {
        match self {
            SqlValue::Null(kind) => *kind,
            SqlValue::Integer(_) => SqlKind::Integer,
            SqlValue::Real(_) => SqlKind::Real,
            SqlValue::Text(_) => SqlKind::Text,
            SqlValue::Bool(_) => SqlKind::Bool,
        }
    }

    /// `Number(value)` coercion: integers, reals and numeric text.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            SqlValue::Null(_) => return None,
            SqlValue::Integer(i) => *i as f64,
            SqlValue::Real(f) => *f,
            SqlValue::Bool(b) => f64::from(u8::from(*b)),
            SqlValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
        };
        n.is_finite().then_some(n)
    }

    /// `!!value` coercion.
    pub fn truthy(&self) -> bool {
        match self {
            SqlValue::Null(_) => false,
            SqlValue::Integer(i) => *i != 0,
            SqlValue::Real(f) => *f != 0.0 && !f.is_nan(),
            SqlValue::Text(s) => !s.is_empty(),
            SqlValue::Bool(b) => *b,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null(_) => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(f) => Some(f.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

macro_rules! optional_into_sql {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(
            impl From<Option<$ty>> for SqlValue {
                fn from(value: Option<$ty>) -> Self {
                    match value {
                        Some(v) => SqlValue::from(v),
                        None => SqlValue::Null(SqlKind::$kind),
                    }
                }
            }
        )+
    };
}

optional_into_sql!(i64 => Integer, f64 => Real, bool => Bool, String => Text, &str => Text);

/// One result row. Column names are folded to lowercase when the row is built,
/// so `clienteNome` (SQLite) and `clientenome` (PostgreSQL) resolve the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbRow {
    columns: BTreeMap<String, SqlValue>,
}

impl DbRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: SqlValue) {
        self.columns.insert(name.to_lowercase(), value);
    }

    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .get(name)
            .or_else(|| self.columns.get(&name.to_lowercase()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(SqlValue::as_text)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(SqlValue::as_number)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.number(name).map(|n| n.trunc() as i64)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).map(SqlValue::truthy).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_engine_case_folding() {
        let sqlite_row = DbRow::new().with("clienteNome", "Ana");
        let pg_row = DbRow::new().with("clientenome", "Ana");
        assert_eq!(sqlite_row.text("clienteNome").as_deref(), Some("Ana"));
        assert_eq!(pg_row.text("clienteNome").as_deref(), Some("Ana"));
    }

    #[test]
    fn number_coercion_matches_js_number() {
        let row = DbRow::new()
            .with("a", 3_i64)
            .with("b", 2.5_f64)
            .with("c", " 42 ")
            .with("d", "abc")
            .with("e", Option::<f64>::None);
        assert_eq!(row.number("a"), Some(3.0));
        assert_eq!(row.number("b"), Some(2.5));
        assert_eq!(row.number("c"), Some(42.0));
        assert_eq!(row.number("d"), None);
        assert_eq!(row.number("e"), None);
        assert_eq!(row.number("missing"), None);
    }

    #[test]
    fn flag_is_double_negation() {
        let row = DbRow::new()
            .with("zero", 0_i64)
            .with("one", 1_i64)
            .with("pg", true)
            .with("null", Option::<i64>::None);
        assert!(!row.flag("zero"));
        assert!(row.flag("one"));
        assert!(row.flag("pg"));
        assert!(!row.flag("null"));
        assert!(!row.flag("missing"));
    }

    #[test]
    fn typed_nulls_keep_their_kind() {
        assert_eq!(SqlValue::from(Option::<String>::None).kind(), SqlKind::Text);
        assert_eq!(SqlValue::from(Option::<f64>::None).kind(), SqlKind::Real);
        assert!(SqlValue::from(Option::<bool>::None).is_null());
    }
}

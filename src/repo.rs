//! Query layer over `Database`. SQL stays engine-neutral: `?` placeholders,
//! stored `*Chave` columns for accent- and case-insensitive matching, `RETURNING`
//! for generated keys.

use crate::db::SqlValue;
use crate::text::chave;

pub mod contatos;
pub mod imoveis;
pub mod leads;

/// Accumulates `WHERE` fragments and their parameters in order.
#[derive(Debug, Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl Conditions {
    pub(crate) fn push(&mut self, clause: impl Into<String>, values: impl IntoIterator<Item = SqlValue>) {
        self.clauses.push(clause.into());
        self.params.extend(values);
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub(crate) fn params_with(&self, extra: impl IntoIterator<Item = SqlValue>) -> Vec<SqlValue> {
        self.params.iter().cloned().chain(extra).collect()
    }
}

/// `%term%` pattern matched against a key column. Wildcards typed by the user are dropped.
pub(crate) fn like_pattern(term: &str) -> String {
    let cleaned: String = chave(term)
        .chars()
        .filter(|c| *c != '%' && *c != '_')
        .collect();
    format!("%{cleaned}%")
}

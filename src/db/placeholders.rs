use std::fmt::Write as _;

/// Rewrite `?` placeholders to `$1, $2, …` in source order.
///
/// This is a plain character scan: a `?` inside a quoted literal is rewritten too.
/// Statements that need a literal question mark must pass it as a parameter.
pub fn to_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0_usize;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            let _ = write!(out, "${n}");
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn count(sql: &str) -> usize {
    sql.chars().filter(|c| *c == '?').count()
}

// SPDX-License-Identifier: MPL-2.0

//! PostgREST query construction.
//!
//! A [`Query`] names a table and carries the horizontal filters, embed list,
//! ordering and limit that end up in the request's query string.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Column list, including embedded relations like `*,profiles(*)`
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(self, column: &str, value: &str) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: &str) -> Self {
        self.filter(column, "neq", value)
    }

    /// Case-insensitive substring match
    pub fn ilike_contains(self, column: &str, needle: &str) -> Self {
        let escaped = escape_like(needle);
        self.filter(column, "ilike", &format!("%{escaped}%"))
    }

    /// `or=(a.eq.x,b.eq.y)`: a row matches if any `(column, value)` equals
    pub fn or_eq(mut self, alternatives: &[(&str, &str)]) -> Self {
        let clauses: Vec<String> = alternatives
            .iter()
            .map(|(column, value)| format!("{column}.eq.{}", quote_or_value(value)))
            .collect();
        self.filters
            .push(("or".to_string(), format!("({})", clauses.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{column}.{direction}"));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn filter(mut self, column: &str, op: &str, value: &str) -> Self {
        self.filters
            .push((column.to_string(), format!("{op}.{value}")));
        self
    }

    /// Query-string pairs in request order. Values are unencoded.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 3);
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Value of the first filter on `column`, e.g. `"eq.42"`
    #[cfg(test)]
    pub fn filter_value(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }
}

/// `%` and `_` are wildcards in LIKE patterns; searching for them should match literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Values inside `or=(...)` must be double-quoted when they contain reserved characters.
fn quote_or_value(value: &str) -> String {
    if value.contains([',', '.', ':', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(q: &Query) -> Vec<(String, String)> {
        q.to_pairs()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn test_channels_query() {
        let q = Query::table("channels")
            .select("*")
            .eq("server_id", "s1")
            .order("position", true);

        assert_eq!(
            pairs(&q),
            vec![
                pair("select", "*"),
                pair("server_id", "eq.s1"),
                pair("order", "position.asc"),
            ]
        );
    }

    #[test]
    fn test_search_query() {
        let q = Query::table("profiles")
            .select("*")
            .ilike_contains("username", "ali")
            .neq("id", "me")
            .limit(10);

        assert_eq!(q.filter_value("username"), Some("ilike.%ali%"));
        assert_eq!(q.filter_value("id"), Some("neq.me"));
        assert_eq!(q.limit_value(), Some(10));
        assert_eq!(pairs(&q).last(), Some(&pair("limit", "10")));
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        let q = Query::table("profiles").ilike_contains("username", "a_b%");
        assert_eq!(q.filter_value("username"), Some("ilike.%a\\_b\\%%"));
    }

    #[test]
    fn test_or_filter() {
        let q = Query::table("friendships").or_eq(&[("user_id", "u1"), ("friend_id", "u1")]);
        assert_eq!(
            q.filter_value("or"),
            Some("(user_id.eq.u1,friend_id.eq.u1)")
        );
    }

    #[test]
    fn test_or_filter_quotes_reserved_values() {
        let q = Query::table("t").or_eq(&[("a", "x,y")]);
        assert_eq!(q.filter_value("or"), Some("(a.eq.\"x,y\")"));
    }

    #[test]
    fn test_multiple_orders_join() {
        let q = Query::table("messages")
            .order("created_at", false)
            .order("id", true);
        assert_eq!(pairs(&q), vec![pair("order", "created_at.desc,id.asc")]);
    }
}

use super::identity::LegacyKey;

/// Keyset page over a legacy table: ascending by `id`, strictly after `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkQuery {
    pub limit: u32,
    pub after: Option<LegacyKey>,
}

impl ChunkQuery {
    pub fn new(limit: u32, after: Option<LegacyKey>) -> Self {
        Self { limit, after }
    }

    pub(crate) fn to_sql(&self, quoted_table: &str) -> String {
        match self.after {
            Some(_) => format!("SELECT * FROM {quoted_table} WHERE \"id\" > ?1 ORDER BY \"id\" ASC LIMIT ?2"),
            None => format!("SELECT * FROM {quoted_table} ORDER BY \"id\" ASC LIMIT ?1"),
        }
    }

    /// A full page may still be the last one; callers stop on `read == 0` too.
    pub fn has_more(&self, fetched: usize) -> bool {
        fetched == self.limit as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_no_cursor_predicate() {
        let q = ChunkQuery::new(10, None);
        assert_eq!(
            q.to_sql("\"industries\""),
            "SELECT * FROM \"industries\" ORDER BY \"id\" ASC LIMIT ?1"
        );
    }

    #[test]
    fn resumed_page_skips_past_cursor() {
        let q = ChunkQuery::new(10, Some(LegacyKey::Int(40)));
        assert!(q.to_sql("\"admins\"").contains("WHERE \"id\" > ?1"));
    }

    #[test]
    fn has_more_only_on_full_page() {
        let q = ChunkQuery::new(3, None);
        assert!(q.has_more(3));
        assert!(!q.has_more(2));
        assert!(!q.has_more(0));
    }
}

//! Cursor-Paginated Connection Output
//!
//! Relay-style connection shape shared by every paginated query: edges
//! carrying a node and its opaque cursor, page info, and an exact total
//! count. Page-size arguments are clamped here, never rejected; cursors
//! by contrast are rejected when malformed (see `lineage_core::cursor`).

use async_graphql::{OutputType, SimpleObject};
use lineage_core::encode_cursor;

use crate::routes::graphql::{GqlPerson, GqlSearchResult};

/// Hard ceiling on requested page sizes.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Clamp a requested `first`/`last` value into `0..=MAX_PAGE_SIZE`.
///
/// Absent means the default; negative values clamp to an empty page
/// rather than erroring.
pub fn clamp_page_size(requested: Option<i32>) -> usize {
    match requested {
        None => DEFAULT_PAGE_SIZE,
        Some(n) => n.clamp(0, MAX_PAGE_SIZE as i32) as usize,
    }
}

/// Split an overfetched row set (`limit + 1` rows requested) into the
/// page itself and whether more rows exist past it.
pub fn trim_overfetch<T>(mut rows: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let had_more = rows.len() > limit;
    rows.truncate(limit);
    (rows, had_more)
}

/// Pagination metadata for a connection.
#[derive(Debug, Clone, SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One node paired with its cursor.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "PersonEdge", params(GqlPerson)))]
#[graphql(concrete(name = "SearchResultEdge", params(GqlSearchResult)))]
pub struct Edge<T: OutputType> {
    pub node: T,
    pub cursor: String,
}

/// A page of nodes with cursors, page info and an exact total.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "PersonConnection", params(GqlPerson)))]
#[graphql(concrete(name = "SearchResultConnection", params(GqlSearchResult)))]
pub struct Connection<T: OutputType>
where
    Edge<T>: OutputType,
{
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    pub total_count: i64,
}

/// Assemble a connection from the final node page.
///
/// `id_of` yields the raw id each node's cursor encodes.
pub fn build_connection<T, F>(
    nodes: Vec<T>,
    id_of: F,
    has_next_page: bool,
    has_previous_page: bool,
    total_count: i64,
) -> Connection<T>
where
    T: OutputType,
    Edge<T>: OutputType,
    F: Fn(&T) -> String,
{
    let edges: Vec<Edge<T>> = nodes
        .into_iter()
        .map(|node| {
            let cursor = encode_cursor(&id_of(&node));
            Edge { node, cursor }
        })
        .collect();

    let page_info = PageInfo {
        has_next_page,
        has_previous_page,
        start_cursor: edges.first().map(|e| e.cursor.clone()),
        end_cursor: edges.last().map(|e| e.cursor.clone()),
    };

    Connection {
        edges,
        page_info,
        total_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(None), 25);
        assert_eq!(clamp_page_size(Some(10)), 10);
        assert_eq!(clamp_page_size(Some(100)), 100);
        assert_eq!(clamp_page_size(Some(101)), 100);
        assert_eq!(clamp_page_size(Some(5000)), 100);
        assert_eq!(clamp_page_size(Some(0)), 0);
        assert_eq!(clamp_page_size(Some(-7)), 0);
    }

    #[test]
    fn test_trim_overfetch() {
        let (page, more) = trim_overfetch(vec![1, 2, 3, 4], 3);
        assert_eq!(page, vec![1, 2, 3]);
        assert!(more);

        let (page, more) = trim_overfetch(vec![1, 2], 3);
        assert_eq!(page, vec![1, 2]);
        assert!(!more);

        let (page, more) = trim_overfetch(Vec::<i32>::new(), 3);
        assert!(page.is_empty());
        assert!(!more);
    }

    proptest! {
        #[test]
        fn prop_clamp_is_always_in_bounds(n in any::<i32>()) {
            let clamped = clamp_page_size(Some(n));
            prop_assert!(clamped <= MAX_PAGE_SIZE);
        }

        #[test]
        fn prop_trim_never_exceeds_limit(rows in proptest::collection::vec(any::<u8>(), 0..300), limit in 0usize..150) {
            let had_extra = rows.len() > limit;
            let (page, more) = trim_overfetch(rows, limit);
            prop_assert!(page.len() <= limit);
            prop_assert_eq!(more, had_extra);
        }
    }
}

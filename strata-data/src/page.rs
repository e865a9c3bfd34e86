use serde::Serialize;

use crate::pagination::Pagination;

/// A page of search results with neighbour page numbers.
///
/// Built from a result fetched with `fetch_one_more`: the extra row, when
/// present, proves a next page exists and is dropped from `items`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub prev_page: Option<u64>,
    pub next_page: Option<u64>,
}

impl<T> SearchPage<T> {
    pub fn from_lookahead(mut items: Vec<T>, pagination: &Pagination) -> Self {
        let page_size = usize::try_from(pagination.page_size()).unwrap_or(usize::MAX);
        let has_next = items.len() > page_size;
        items.truncate(page_size);
        let page = pagination.page();
        Self {
            items,
            prev_page: (page > 1).then(|| page - 1),
            next_page: has_next.then(|| page + 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> SearchPage<U> {
        SearchPage {
            items: self.items.into_iter().map(f).collect(),
            prev_page: self.prev_page,
            next_page: self.next_page,
        }
    }
}

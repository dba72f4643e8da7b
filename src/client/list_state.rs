//! Paginated list state for a catalog or lead view.
//!
//! Each request is issued a [`Ticket`] carrying a generation number. Starting a new
//! query bumps the generation, so a slow response to an older query is dropped
//! instead of overwriting newer results.

use crate::pagination::{PageRequest, Pagination, Paginated, LIMITE_PADRAO};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Replace,
    Append,
}

/// Handle for one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    mode: LoadMode,
    request: PageRequest,
}

impl Ticket {
    pub fn page_request(&self) -> PageRequest {
        self.request
    }

    pub fn is_append(&self) -> bool {
        self.mode == LoadMode::Append
    }
}

#[derive(Debug, Clone)]
pub struct ListState<T, F> {
    filters: F,
    limit: u32,
    items: Vec<T>,
    pagination: Option<Pagination>,
    status: LoadStatus,
    error: Option<String>,
    generation: u64,
}

impl<T, F> ListState<T, F> {
    pub fn new(filters: F) -> Self {
        Self::with_limit(filters, LIMITE_PADRAO)
    }

    pub fn with_limit(filters: F, limit: u32) -> Self {
        Self {
            filters,
            limit: limit.max(1),
            items: Vec::new(),
            pagination: None,
            status: LoadStatus::Idle,
            error: None,
            generation: 0,
        }
    }

    pub fn filters(&self) -> &F {
        &self.filters
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn has_next_page(&self) -> bool {
        self.pagination.is_some_and(|p| p.has_next_page)
    }

    fn issue(&mut self, mode: LoadMode, page: u32) -> Ticket {
        self.generation += 1;
        self.status = LoadStatus::Loading;
        Ticket {
            generation: self.generation,
            mode,
            request: PageRequest {
                page,
                limit: self.limit,
            },
        }
    }

    /// New filters: start over at page 1. Any request still in flight becomes stale.
    pub fn replace(&mut self, filters: F) -> Ticket {
        self.filters = filters;
        self.issue(LoadMode::Replace, 1)
    }

    /// Reload page 1 with the current filters.
    pub fn refresh(&mut self) -> Ticket {
        self.issue(LoadMode::Replace, 1)
    }

    /// Next page, only when the server reported one and nothing is loading.
    pub fn append(&mut self) -> Option<Ticket> {
        if self.is_loading() || !self.has_next_page() {
            return None;
        }
        let next = self.pagination.map(|p| p.page + 1).unwrap_or(1);
        Some(self.issue(LoadMode::Append, next))
    }

    /// Apply a response. Returns `false` when the ticket was superseded and the response dropped.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<Paginated<T>, String>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                target: "imobiliaria",
                event = "list_response_discarded",
                ticket = ticket.generation,
                current = self.generation,
            );
            return false;
        }
        match result {
            Ok(page) => {
                match ticket.mode {
                    LoadMode::Replace => self.items = page.data,
                    LoadMode::Append => self.items.extend(page.data),
                }
                self.pagination = page.pagination;
                self.status = LoadStatus::Success;
                self.error = None;
            }
            Err(message) => {
                self.status = LoadStatus::Error;
                self.error = Some(message);
            }
        }
        true
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
        if self.status == LoadStatus::Error {
            self.status = if self.pagination.is_some() || !self.items.is_empty() {
                LoadStatus::Success
            } else {
                LoadStatus::Idle
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(data: Vec<u32>, request: PageRequest, total: u64) -> Paginated<u32> {
        Paginated::page(data, request, total)
    }

    #[test]
    fn append_grows_by_page_size() {
        let mut state: ListState<u32, ()> = ListState::with_limit((), 2);
        let first = state.refresh();
        assert!(state.resolve(first, Ok(page(vec![1, 2], first.page_request(), 5))));
        assert!(state.has_next_page());

        let second = state.append().expect("next page");
        assert_eq!(second.page_request().page, 2);
        assert!(state.append().is_none(), "one request at a time");
        assert!(state.resolve(second, Ok(page(vec![3, 4], second.page_request(), 5))));
        assert_eq!(state.items(), &[1, 2, 3, 4]);

        let third = state.append().expect("last page");
        state.resolve(third, Ok(page(vec![5], third.page_request(), 5)));
        assert_eq!(state.items().len(), 5);
        assert!(!state.has_next_page());
        assert!(state.append().is_none());
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut state: ListState<u32, &str> = ListState::with_limit("casa", 2);
        let old = state.refresh();
        let new = state.replace("apartamento");
        assert!(state.resolve(new, Ok(page(vec![9], new.page_request(), 1))));
        assert!(!state.resolve(old, Ok(page(vec![1, 2], old.page_request(), 4))));
        assert_eq!(state.items(), &[9]);
        assert_eq!(*state.filters(), "apartamento");
    }

    #[test]
    fn replace_resets_items() {
        let mut state: ListState<u32, u8> = ListState::with_limit(0, 2);
        let t = state.refresh();
        state.resolve(t, Ok(page(vec![1, 2], t.page_request(), 4)));
        let t = state.replace(1);
        assert_eq!(t.page_request().page, 1);
        state.resolve(t, Ok(page(vec![7], t.page_request(), 1)));
        assert_eq!(state.items(), &[7]);
    }

    #[test]
    fn errors_keep_data_and_can_be_dismissed() {
        let mut state: ListState<u32, ()> = ListState::with_limit((), 2);
        let t = state.refresh();
        state.resolve(t, Ok(page(vec![1, 2], t.page_request(), 4)));
        let t = state.append().expect("next");
        state.resolve(t, Err("falha de rede".into()));
        assert_eq!(state.status(), LoadStatus::Error);
        assert_eq!(state.error(), Some("falha de rede"));
        assert_eq!(state.items(), &[1, 2]);

        state.dismiss_error();
        assert_eq!(state.error(), None);
        assert_eq!(state.status(), LoadStatus::Success);
        assert!(state.append().is_some(), "retry allowed after an error");
    }
}

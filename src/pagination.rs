use serde::{Deserialize, Serialize};

pub const LIMITE_PADRAO: u32 = 12;
pub const LIMITE_MAXIMO: u32 = 100;

/// Requested page window, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// `None` when neither `page` nor `limit` was given: the caller wants the full list.
    pub fn from_query(page: Option<u32>, limit: Option<u32>) -> Option<Self> {
        if page.is_none() && limit.is_none() {
            return None;
        }
        Some(Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(LIMITE_PADRAO).clamp(1, LIMITE_MAXIMO),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let limit = u64::from(request.limit.max(1));
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total.div_ceil(limit),
            has_next_page: u64::from(request.page) * limit < total,
            has_prev_page: request.page > 1,
        }
    }
}

/// `{data, pagination}` body shared by every list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Paginated<T> {
    pub fn full(data: Vec<T>) -> Self {
        Self {
            data,
            pagination: None,
        }
    }

    pub fn page(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            data,
            pagination: Some(Pagination::new(request, total)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absent_params_mean_full_list() {
        assert_eq!(PageRequest::from_query(None, None), None);
        assert_eq!(
            PageRequest::from_query(Some(2), None),
            Some(PageRequest { page: 2, limit: LIMITE_PADRAO })
        );
    }

    #[test]
    fn limits_are_clamped() {
        let req = PageRequest::from_query(Some(0), Some(500)).expect("request");
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, LIMITE_MAXIMO);
        assert_eq!(PageRequest::from_query(None, Some(0)).map(|r| r.limit), Some(1));
    }

    #[test]
    fn last_page_has_no_next() {
        let p = Pagination::new(PageRequest { page: 3, limit: 12 }, 36);
        assert_eq!(p.total_pages, 3);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);

        let p = Pagination::new(PageRequest { page: 1, limit: 12 }, 13);
        assert_eq!(p.total_pages, 2);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);
    }

    #[test]
    fn serializes_camel_case() {
        let p = Pagination::new(PageRequest { page: 1, limit: 12 }, 0);
        let json = serde_json::to_value(p).expect("serialize");
        assert_eq!(json["totalPages"], 0);
        assert_eq!(json["hasNextPage"], false);
    }

    proptest! {
        #[test]
        fn has_next_iff_more_rows_remain(page in 1u32..200, limit in 1u32..=100, total in 0u64..50_000) {
            let p = Pagination::new(PageRequest { page, limit }, total);
            prop_assert_eq!(p.has_next_page, u64::from(page) * u64::from(limit) < total);
            prop_assert!(p.total_pages * u64::from(limit) >= total);
        }
    }
}

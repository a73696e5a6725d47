//! Shared page-number pagination helpers.

use serde::Serialize;

const MIN_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 100;
pub const DEFAULT_LIMIT: u32 = 10;

/// A validated page request. Pages are 1-based; limits are clamped so a
/// client can never ask the database for an unbounded result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(MIN_LIMIT, MAX_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of results plus the metadata clients need to paginate further.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let limit = u64::from(request.limit());
        let total_pages = total_items.div_ceil(limit).min(u64::from(u32::MAX)) as u32;
        Self {
            items,
            current_page: request.page(),
            total_pages,
            total_items,
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), request, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let req = PageRequest::new(None, None);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_LIMIT);

        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MIN_LIMIT);

        let req = PageRequest::new(Some(3), Some(500));
        assert_eq!(req.page(), 3);
        assert_eq!(req.limit(), MAX_LIMIT);
    }

    #[test]
    fn offset_skips_previous_pages() {
        let req = PageRequest::new(Some(4), Some(25));
        assert_eq!(req.offset(), 75);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(Some(1), Some(10));
        let page = Page::new(vec![(); 10], req, 21);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_items, 21);

        let empty: Page<()> = Page::empty(req);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.items.is_empty());
    }
}

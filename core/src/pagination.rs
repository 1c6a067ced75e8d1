//! Pagination for read projections.
//!
//! Pages are 1-indexed. `total_pages = ceil(total_items / page_size)`, so an empty result
//! set has zero pages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected page request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid page request: page {page}, page size {page_size}")]
pub struct InvalidPageRequest {
    /// Requested page
    pub page: i64,
    /// Requested page size
    pub page_size: i64,
}

/// A validated page request (page ≥ 1, `page_size` ≥ 1)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validate raw caller input.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPageRequest`] when either value is below 1 or does not fit in `u32`.
    pub fn new(page: i64, page_size: i64) -> Result<Self, InvalidPageRequest> {
        let invalid = InvalidPageRequest { page, page_size };
        let page_u32 = u32::try_from(page).map_err(|_| invalid)?;
        let size_u32 = u32::try_from(page_size).map_err(|_| invalid)?;
        if page_u32 == 0 || size_u32 == 0 {
            return Err(invalid);
        }
        Ok(Self {
            page: page_u32,
            page_size: size_u32,
        })
    }

    /// 1-indexed page number
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items to skip
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// Same as [`offset`](Self::offset) but as a `usize` for slicing in-memory results
    #[must_use]
    pub fn offset_usize(&self) -> usize {
        usize::try_from(self.offset()).unwrap_or(usize::MAX)
    }
}

/// One page of results plus totals
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-indexed page number
    pub page: u32,
    /// Requested page size
    pub page_size: u32,
    /// Items across all pages
    pub total_items: u64,
    /// `ceil(total_items / page_size)`
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page from the fetched items and the overall count.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total_items,
            total_pages: total_items.div_ceil(u64::from(request.page_size())),
        }
    }

    /// Transform the items, keeping the totals.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

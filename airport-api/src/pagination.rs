use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<T>,
}

impl PageQuery {
    /// Slices `items` to the requested page. The first page always exists,
    /// any other page past the end is a 404.
    pub fn paginate<T>(&self, items: Vec<T>, default_size: usize) -> Result<Page<T>, AppError> {
        let page_size = match self.page_size {
            Some(size) if size > 0 => size.min(MAX_PAGE_SIZE),
            _ => default_size.clamp(1, MAX_PAGE_SIZE),
        };
        let page = self.page.unwrap_or(1);
        let count = items.len();

        let start = page
            .checked_sub(1)
            .and_then(|p| p.checked_mul(page_size))
            .ok_or_else(invalid_page)?;
        if page > 1 && start >= count {
            return Err(invalid_page());
        }

        let results = items.into_iter().skip(start).take(page_size).collect();
        Ok(Page { count, page, page_size, results })
    }
}

fn invalid_page() -> AppError {
    AppError::NotFoundError("Invalid page.".to_string())
}

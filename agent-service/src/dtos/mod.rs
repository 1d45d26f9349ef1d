pub mod agent;
pub mod health;
pub mod image;

use serde::Deserialize;
use validator::Validate;

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    10
}

/// `?page=&page_size=&sort=` for list endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PageParams {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page: u64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub page_size: u64,

    /// Comma separated keys, `-` prefix for descending.
    pub sort: Option<String>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            sort: None,
        }
    }
}

impl PageParams {
    /// Requested sort, newest first when none is given.
    pub fn sort_or_newest(&self) -> String {
        self.sort
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "-created_at".to_string())
    }
}

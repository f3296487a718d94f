//! Shared query infrastructure: the [`Query`] trait and [`PageCommon`] fields.

use url::Url;

/// Default number of history rows requested per page.
pub const DEFAULT_PAGE_SIZE: i64 = 1000;

/// Trait implemented by all query builders. Provides URL serialization and
/// shared builder methods for pagination.
pub trait Query {
    /// Appends this query's parameters to the given URL, returning the modified URL.
    fn add_to_url(&self, url: &Url) -> Url;

    /// Returns a mutable reference to the common paging fields.
    fn get_common(&mut self) -> &mut PageCommon;

    /// Sets the number of results per page.
    fn with_page_size(mut self, page_size: i64) -> Self
    where
        Self: Sized,
    {
        self.get_common().page_size = page_size;
        self
    }

    /// Continues from the cursor returned by a previous page.
    fn with_next_token(mut self, token: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.get_common().next_token = Some(token.into());
        self
    }
}

/// Paging fields shared by cursor-paginated endpoints.
#[derive(Clone, Debug)]
pub struct PageCommon {
    /// Results per page. Defaults to 1000.
    pub page_size: i64,
    /// Cursor from the previous response's `nextToken`.
    pub next_token: Option<String>,
}

impl Default for PageCommon {
    fn default() -> PageCommon {
        PageCommon {
            page_size: DEFAULT_PAGE_SIZE,
            next_token: None,
        }
    }
}

impl PageCommon {
    /// Appends the paging parameters to the URL.
    pub fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("pageSize", &self.page_size.to_string());
        if let Some(token) = &self.next_token {
            url.query_pairs_mut().append_pair("nextToken", token);
        }
        url
    }
}

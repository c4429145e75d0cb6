use std::sync::Arc;

use eventhub_core::error::AppError;
use eventhub_core::models::Fields;

use crate::jsonapi::fetch_page;
use crate::transport::Transport;

/// Walks a paginated collection one page at a time.
///
/// The cursor starts at a fully substituted first-page location and follows
/// each page's next link until it is empty.
pub struct PageCursor {
    transport: Arc<dyn Transport>,
    next_url: String,
    data: Vec<Fields>,
}

impl PageCursor {
    pub fn new(transport: Arc<dyn Transport>, first_url: impl Into<String>) -> Self {
        Self {
            transport,
            next_url: first_url.into(),
            data: Vec::new(),
        }
    }

    pub fn has_next(&self) -> bool {
        !self.next_url.is_empty()
    }

    /// Location the next call to [`fetch_next`](Self::fetch_next) reads.
    pub fn next_url(&self) -> &str {
        &self.next_url
    }

    /// Fetches the next page and moves the cursor to its next link.
    ///
    /// On error the cursor is left where it was. An exhausted cursor yields
    /// an empty batch without touching the network.
    pub async fn fetch_next(&mut self) -> Result<&[Fields], AppError> {
        if !self.has_next() {
            self.data.clear();
            return Ok(&self.data);
        }

        let page = fetch_page(self.transport.as_ref(), &self.next_url).await?;
        self.next_url = page.next;
        self.data = page.data;
        Ok(&self.data)
    }
}

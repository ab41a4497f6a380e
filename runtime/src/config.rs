//! Service-level configuration.

use access_request_core::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use std::time::Duration;

/// Tunables for [`crate::AccessRequestService`].
///
/// # Example
///
/// ```
/// use access_request_runtime::ServiceConfig;
///
/// let config = ServiceConfig::default()
///     .with_max_page_size(50)
///     .with_numbering_max_retries(2);
/// assert_eq!(config.max_page_size, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Page size when the caller gives none
    pub default_page_size: u32,
    /// Largest page size a caller may ask for
    pub max_page_size: u32,
    /// Retries after a request-number collision
    pub numbering_max_retries: usize,
    /// Base delay before a numbering retry
    pub numbering_retry_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            numbering_max_retries: 1,
            numbering_retry_delay: Duration::from_millis(10),
        }
    }
}

impl ServiceConfig {
    /// Set the default page size.
    #[must_use]
    pub const fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the page size cap.
    #[must_use]
    pub const fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the numbering retry budget.
    #[must_use]
    pub const fn with_numbering_max_retries(mut self, retries: usize) -> Self {
        self.numbering_max_retries = retries;
        self
    }

    /// Set the base delay before a numbering retry.
    #[must_use]
    pub const fn with_numbering_retry_delay(mut self, delay: Duration) -> Self {
        self.numbering_retry_delay = delay;
        self
    }
}

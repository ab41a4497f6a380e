//! Application state for Axum handlers.

use access_request_runtime::AccessRequestService;

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The orchestration facade
    pub service: AccessRequestService,
}

impl AppState {
    /// Wrap a service.
    #[must_use]
    pub const fn new(service: AccessRequestService) -> Self {
        Self { service }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}

//! Decision notifications.
//!
//! Called after an approve or reject has committed. A failing notifier never
//! undoes the decision; callers log the error and move on.

use crate::aggregate::AccessRequest;
use crate::audit::Decision;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Receives approve/reject decisions once they are durable.
pub trait RequestNotifier: Send + Sync {
    /// `request` has just been decided.
    fn decision_made<'a>(
        &'a self,
        request: &'a AccessRequest,
        decision: Decision,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Notifier that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl RequestNotifier for NoopNotifier {
    fn decision_made<'a>(
        &'a self,
        _request: &'a AccessRequest,
        _decision: Decision,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::aggregate::CreateAccessRequest;
    use crate::numbering::RequestNumber;
    use crate::types::{Principal, PrincipalId, RequestId, Role};
    use chrono::Utc;

    #[test]
    fn noop_notifier_succeeds() {
        let requester = Principal::new(PrincipalId::new(), Role::Admin, "IT");
        let request = CreateAccessRequest {
            employee_first_name: Some("A".into()),
            employee_last_name: Some("B".into()),
            department: Some("IT".into()),
            email: Some("a@b.io".into()),
            date_of_joining: Some("2025-02-01".into()),
            hardware: vec!["Laptop".into()],
            ..CreateAccessRequest::default()
        }
        .validate()
        .unwrap()
        .into_new_request(RequestNumber::format(2025, 1), &requester, Utc::now())
        .into_request(RequestId::new(), &[]);

        let result = tokio_test::block_on(NoopNotifier.decision_made(&request, Decision::Approved));
        assert!(result.is_ok());
    }
}

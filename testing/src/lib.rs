//! # Access Request Testing
//!
//! Testing utilities for the access request service.
//!
//! This crate provides:
//! - Mock implementations of environment traits (fixed clock, recording notifier)
//! - An in-memory [`AccessRequestStore`](access_request_core::store::AccessRequestStore)
//! - Fixtures for principals and creation bodies
//! - proptest strategies for domain enums
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use access_request_testing::{InMemoryAccessRequestStore, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn creates_first_number_of_the_year() {
//!     let store = Arc::new(InMemoryAccessRequestStore::new());
//!     let service = AccessRequestService::new(store, Arc::new(test_clock()));
//!
//!     let request = service
//!         .create_request(&fixtures::admin(), fixtures::software_request("Finance"))
//!         .await?;
//!     assert_eq!(request.request_number.as_str(), "SAR-2025-001");
//! }
//! ```

use access_request_core::environment::{Clock, RequestEnvironment};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub mod memory_store;
pub mod reducer_test;

pub use memory_store::InMemoryAccessRequestStore;
pub use reducer_test::ReducerTest;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use access_request_core::aggregate::AccessRequest;
    use access_request_core::audit::Decision;
    use access_request_core::notify::RequestNotifier;
    use access_request_core::types::RequestId;
    use access_request_core::{AccessError, Result};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use access_request_testing::mocks::FixedClock;
    /// use access_request_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which it does not.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Notifier that records every decision it is told about.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        calls: Mutex<Vec<(RequestId, Decision)>>,
        failing: AtomicBool,
    }

    impl RecordingNotifier {
        /// A notifier that succeeds.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier that records, then fails every call.
        #[must_use]
        pub fn failing() -> Self {
            let notifier = Self::default();
            notifier.failing.store(true, Ordering::SeqCst);
            notifier
        }

        /// Decisions received so far, in call order.
        #[must_use]
        pub fn calls(&self) -> Vec<(RequestId, Decision)> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl RequestNotifier for RecordingNotifier {
        fn decision_made<'a>(
            &'a self,
            request: &'a AccessRequest,
            decision: Decision,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((request.id, decision));
                if self.failing.load(Ordering::SeqCst) {
                    Err(AccessError::StorageFailure("notification channel down".into()))
                } else {
                    Ok(())
                }
            })
        }
    }
}

/// Principals and request bodies used across test suites.
pub mod fixtures {
    use access_request_core::aggregate::CreateAccessRequest;
    use access_request_core::assets::{Asset, AssetStatus};
    use access_request_core::grants::{ErpAccess, FinanceModule, NetworkEmailAccess};
    use access_request_core::types::{AssetId, Principal, PrincipalId, Role};

    /// Admin of the IT department.
    #[must_use]
    pub fn admin() -> Principal {
        Principal::new(PrincipalId::new(), Role::Admin, "IT")
    }

    /// Manager of `department`.
    #[must_use]
    pub fn manager(department: &str) -> Principal {
        Principal::new(PrincipalId::new(), Role::Manager, department)
    }

    /// Plain user in `department`.
    #[must_use]
    pub fn user(department: &str) -> Principal {
        Principal::new(PrincipalId::new(), Role::User, department)
    }

    /// Valid employee details with no grant and no hardware.
    #[must_use]
    pub fn employee(department: &str) -> CreateAccessRequest {
        CreateAccessRequest {
            employee_first_name: Some("John".into()),
            employee_last_name: Some("Doe".into()),
            employee_id: Some("EMP-1001".into()),
            department: Some(department.into()),
            department_head: Some("Ada Mensah".into()),
            email: Some("john.doe@example.com".into()),
            date_of_joining: Some("2025-03-01".into()),
            ..CreateAccessRequest::default()
        }
    }

    /// Network login plus ERP finance access.
    #[must_use]
    pub fn software_request(department: &str) -> CreateAccessRequest {
        CreateAccessRequest {
            network_email: Some(NetworkEmailAccess {
                network_login: true,
                email_personal: true,
                ..NetworkEmailAccess::default()
            }),
            erp: Some(ErpAccess {
                finance: FinanceModule {
                    accounts_payable: true,
                    ..FinanceModule::default()
                },
                ..ErpAccess::default()
            }),
            ..employee(department)
        }
    }

    /// Hardware only, one item per label.
    #[must_use]
    pub fn hardware_request(department: &str, labels: &[&str]) -> CreateAccessRequest {
        CreateAccessRequest {
            hardware: labels.iter().map(ToString::to_string).collect(),
            ..employee(department)
        }
    }

    /// An inventory asset of `asset_type` in `status`.
    #[must_use]
    pub fn asset(asset_type: &str, status: AssetStatus) -> Asset {
        Asset {
            id: AssetId::new(),
            name: format!("{asset_type} #{}", &AssetId::new().to_string()[..8]),
            asset_type: asset_type.to_string(),
            serial_number: Some(format!("SN-{}", &AssetId::new().to_string()[..8])),
            condition: Some("good".into()),
            status,
        }
    }
}

/// proptest strategies for domain types.
pub mod properties {
    use access_request_core::types::{Principal, PrincipalId, RequestStatus, Role};
    use proptest::prelude::*;

    /// Any lifecycle status.
    pub fn any_status() -> impl Strategy<Value = RequestStatus> {
        prop::sample::select(RequestStatus::ALL.to_vec())
    }

    /// Any role.
    pub fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(vec![Role::Admin, Role::Manager, Role::User])
    }

    /// One of a few department names.
    pub fn any_department() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["Finance", "HR", "IT", "Procurement"]).prop_map(String::from)
    }

    /// A principal with a fresh id.
    pub fn any_principal() -> impl Strategy<Value = Principal> {
        (any_role(), any_department())
            .prop_map(|(role, department)| Principal::new(PrincipalId::new(), role, department))
    }
}

/// Environment backed by [`test_clock`].
#[must_use]
pub fn test_environment() -> RequestEnvironment {
    RequestEnvironment::new(Arc::new(test_clock()))
}

/// Route `tracing` output to the test writer. Safe to call more than once.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "access_request=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingNotifier, test_clock};

//! # Access Request Core
//!
//! Domain model and pure business rules for system access requests.
//!
//! An access request asks IT to provision systems (network/email, ERP modules,
//! time-attendance) and hardware for an employee. This crate holds everything that
//! can be decided without I/O:
//!
//! - **Authorization**: role capabilities, data scopes, resource ownership checks
//! - **Aggregate**: boundary validation and construction of new requests
//! - **Lifecycle**: the status state machine as a reducer
//! - **Asset linking**: binding an available asset to a handover item, as a reducer
//! - **Provisioning**: per-grant provisioning progress, as a reducer
//! - **Audit ledger**: the closed history vocabulary and approval records
//! - **Storage seam**: the [`store::AccessRequestStore`] trait implemented by the shell
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Reducers mutate state in place and return ledger effects as values
//! - A reducer that returns an error leaves its state untouched
//! - Time is injected through [`environment::Clock`]
//!
//! ## Example
//!
//! ```ignore
//! use access_request_core::lifecycle::{LifecycleReducer, Transition};
//! use access_request_core::reducer::Reducer;
//!
//! let effects = LifecycleReducer.reduce(
//!     &mut request,
//!     Transition::new(RequestStatus::Approved, admin),
//!     &env,
//! )?;
//! // effects: one ApprovalRecord + one HistoryEntry, persisted by the store
//! ```

pub mod aggregate;
pub mod assets;
pub mod audit;
pub mod authorization;
pub mod error;
pub mod grants;
pub mod lifecycle;
pub mod notify;
pub mod numbering;
pub mod provisioning;
pub mod query;
pub mod store;
pub mod types;

pub use chrono::{DateTime, NaiveDate, Utc};
pub use error::{AccessError, ErrorKind, Result};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - pure state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Effects>`
///
/// They contain the lifecycle and linking rules and are deterministic and testable.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Effect`: Descriptions of writes the shell must persist with the state
    /// - `Error`: Why an action was refused
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for LifecycleReducer {
    ///     type State = AccessRequest;
    ///     type Action = Transition;
    ///     type Environment = RequestEnvironment;
    ///     type Effect = LedgerEffect;
    ///     type Error = AccessError;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut AccessRequest,
    ///         action: Transition,
    ///         env: &RequestEnvironment,
    ///     ) -> Result<SmallVec<[LedgerEffect; 4]>, AccessError> {
    ///         // guards first, then stamps
    ///         Ok(smallvec![])
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The effect descriptions produced by a successful reduction
        type Effect;

        /// The error returned when an action is refused
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be persisted atomically with the state
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when a guard refuses the action. The state must not
        /// have been modified in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Effect; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All time reads go through [`Clock`] so reducers stay deterministic under test.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(time);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Dependencies shared by the lifecycle and asset-linking reducers.
    #[derive(Clone)]
    pub struct RequestEnvironment {
        /// Source of `now` for every stamped timestamp
        pub clock: Arc<dyn Clock>,
    }

    impl RequestEnvironment {
        /// Create an environment around the given clock.
        #[must_use]
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self { clock }
        }
    }

    impl std::fmt::Debug for RequestEnvironment {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RequestEnvironment")
                .field("now", &self.clock.now())
                .finish()
        }
    }
}

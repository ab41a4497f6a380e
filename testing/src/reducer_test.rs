//! Ergonomic testing utilities for reducers
//!
//! Fluent Given-When-Then API for the lifecycle and asset-linking reducers. A
//! test either expects the action to be accepted (`then_state`/`then_effects`) or
//! refused (`then_error`), and refused actions are checked to leave the state
//! exactly as given.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use access_request_core::audit::LedgerEffect;
use access_request_core::reducer::Reducer;
use std::fmt::Debug;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<F> = Box<dyn FnOnce(&[F])>;

/// Type alias for error assertion functions
type ErrorAssertion<Err> = Box<dyn FnOnce(&Err)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use access_request_testing::{ReducerTest, test_environment};
///
/// ReducerTest::new(LifecycleReducer)
///     .with_env(test_environment())
///     .given_state(pending_request())
///     .when_action(Transition::new(RequestStatus::Approved, admin))
///     .then_state(|request| assert_eq!(request.status, RequestStatus::Approved))
///     .then_effects(|effects| assertions::assert_history_actions(effects, &[HistoryAction::Approved]))
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    action: Option<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Effect>>,
    error_assertions: Vec<ErrorAssertion<R::Error>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::State: Clone + PartialEq + Debug,
    R::Effect: Debug,
    R::Error: Debug,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[R::Effect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Expect the action to be refused, and assert on the error (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::Error) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set, if the
    /// outcome (accepted or refused) is not the expected one, or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let before = state.clone();
        let outcome = self.reducer.reduce(&mut state, action, &env);

        match outcome {
            Ok(effects) => {
                assert!(
                    self.error_assertions.is_empty(),
                    "Expected the action to be refused, but it produced {effects:?}"
                );
                for assertion in self.state_assertions {
                    assertion(&state);
                }
                for assertion in self.effect_assertions {
                    assertion(&effects);
                }
            }
            Err(error) => {
                assert!(
                    !self.error_assertions.is_empty(),
                    "Expected the action to be accepted, but it was refused: {error:?}"
                );
                assert_eq!(state, before, "A refused action must not modify state");
                for assertion in self.error_assertions {
                    assertion(&error);
                }
            }
        }
    }
}

/// Helper assertions for ledger effects
pub mod assertions {
    use super::LedgerEffect;
    use access_request_core::audit::{Decision, HistoryAction};

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count(effects: &[LedgerEffect], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}: {:?}",
            expected,
            effects.len(),
            effects
        );
    }

    /// Assert the history actions appended, in order
    ///
    /// # Panics
    ///
    /// Panics if the appended actions differ from `expected`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_history_actions(effects: &[LedgerEffect], expected: &[HistoryAction]) {
        let actions: Vec<_> = effects
            .iter()
            .filter_map(LedgerEffect::history)
            .map(|entry| entry.action)
            .collect();
        assert_eq!(actions, expected, "Unexpected history actions");
    }

    /// Assert exactly one approval record with `decision`
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one approval record, or it has another decision.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_single_decision(effects: &[LedgerEffect], decision: Decision) {
        let decisions: Vec<_> = effects
            .iter()
            .filter_map(LedgerEffect::approval)
            .map(|record| record.decision)
            .collect();
        assert_eq!(decisions, vec![decision], "Expected exactly one {decision:?} record");
    }

    /// Assert that no approval record was produced
    ///
    /// # Panics
    ///
    /// Panics if any effect records an approval.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_decision(effects: &[LedgerEffect]) {
        assert!(
            effects.iter().all(|e| e.approval().is_none()),
            "Expected no approval record, but found {effects:?}"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::assertions::*;
    use super::*;
    use crate::{fixtures, test_clock, test_environment};
    use access_request_core::aggregate::AccessRequest;
    use access_request_core::assets::{AssetLinkReducer, AssetStatus, HandoverItem, LinkAsset};
    use access_request_core::audit::{Decision, HistoryAction};
    use access_request_core::environment::Clock;
    use access_request_core::lifecycle::{LifecycleReducer, Transition, TransitionDetails};
    use access_request_core::numbering::RequestNumber;
    use access_request_core::types::{HandoverItemId, RequestId, RequestStatus};
    use access_request_core::{AccessError, ErrorKind};

    fn request(status: RequestStatus) -> AccessRequest {
        let mut request = fixtures::hardware_request("Finance", &["Laptop"])
            .validate()
            .unwrap()
            .into_new_request(RequestNumber::format(2025, 1), &fixtures::user("Finance"), test_clock().now())
            .into_request(RequestId::new(), &[HandoverItemId::new()]);
        request.status = status;
        request
    }

    #[test]
    fn approve_from_under_review() {
        ReducerTest::new(LifecycleReducer)
            .with_env(test_environment())
            .given_state(request(RequestStatus::UnderReview))
            .when_action(Transition::new(RequestStatus::Approved, fixtures::manager("Finance")))
            .then_state(|r| {
                assert_eq!(r.status, RequestStatus::Approved);
                assert!(r.approved_by.is_some());
            })
            .then_effects(|effects| {
                assert_effects_count(effects, 2);
                assert_single_decision(effects, Decision::Approved);
                assert_history_actions(effects, &[HistoryAction::Approved]);
            })
            .run();
    }

    #[test]
    fn reject_without_reason_is_refused() {
        ReducerTest::new(LifecycleReducer)
            .with_env(test_environment())
            .given_state(request(RequestStatus::Pending))
            .when_action(
                Transition::new(RequestStatus::Rejected, fixtures::admin())
                    .with_details(TransitionDetails::default()),
            )
            .then_error(|err| assert_eq!(err.kind(), ErrorKind::ValidationError))
            .run();
    }

    #[test]
    fn completed_is_terminal() {
        ReducerTest::new(LifecycleReducer)
            .with_env(test_environment())
            .given_state(request(RequestStatus::Completed))
            .when_action(Transition::new(RequestStatus::InProgress, fixtures::admin()))
            .then_error(|err| assert_eq!(*err, AccessError::TerminalState(RequestStatus::Completed)))
            .run();
    }

    #[test]
    fn under_review_is_a_plain_status_change() {
        ReducerTest::new(LifecycleReducer)
            .with_env(test_environment())
            .given_state(request(RequestStatus::Pending))
            .when_action(Transition::new(RequestStatus::UnderReview, fixtures::admin()))
            .then_effects(|effects| {
                assert_no_decision(effects);
                assert_history_actions(effects, &[HistoryAction::StatusChanged]);
            })
            .run();
    }

    #[test]
    fn linking_an_assigned_asset_is_refused() {
        let item: HandoverItem = request(RequestStatus::Approved).handover_items[0].clone();
        ReducerTest::new(AssetLinkReducer)
            .with_env(test_environment())
            .given_state(item)
            .when_action(LinkAsset {
                asset: fixtures::asset("Laptop", AssetStatus::Assigned),
                actor: fixtures::admin(),
            })
            .then_error(|err| assert_eq!(err.kind(), ErrorKind::AssetUnavailable))
            .run();
    }
}

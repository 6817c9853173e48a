use serde_json::json;
use skinsight_core::prelude::*;
use skinsight_core::state_machine::{allowed_actions, allowed_transitions, next_step, validate_transition};
use skinsight_test_utils::{jpeg_bytes, session_with, FakeAnalysisClient, FakeCamera};
use proptest::prelude::*;
use std::sync::Arc;

fn any_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Intro),
        Just(Step::Questionnaire),
        Just(Step::Capture),
        Just(Step::Review),
        Just(Step::Results),
    ]
}

fn any_action() -> impl Strategy<Value = NavAction> {
    (0..NavAction::ALL.len()).prop_map(|i| NavAction::ALL[i])
}

fn any_concern() -> impl Strategy<Value = Concern> {
    (0..Concern::ALL.len()).prop_map(|i| Concern::ALL[i])
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Navigate(NavAction),
    Toggle(Concern),
    Consent(bool),
    Age(Option<u32>),
    Upload,
    Reset,
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any_action().prop_map(Op::Navigate),
        2 => any_concern().prop_map(Op::Toggle),
        1 => any::<bool>().prop_map(Op::Consent),
        1 => proptest::option::of(0u32..130).prop_map(Op::Age),
        1 => Just(Op::Upload),
        1 => Just(Op::Reset),
    ]
}

fn fresh_session() -> Session {
    session_with(
        Arc::new(FakeCamera::new()),
        Arc::new(FakeAnalysisClient::succeeding(json!({}))),
    )
}

#[test]
fn test_intro_transitions() {
    assert!(validate_transition(Step::Intro, Step::Questionnaire).is_ok());
    assert!(validate_transition(Step::Intro, Step::Capture).is_ok());

    // Invalid
    assert!(validate_transition(Step::Intro, Step::Review).is_err());
    assert!(validate_transition(Step::Intro, Step::Results).is_err());
}

#[test]
fn test_results_transitions() {
    assert!(validate_transition(Step::Results, Step::Review).is_ok());
    assert!(validate_transition(Step::Results, Step::Intro).is_ok());

    assert!(validate_transition(Step::Results, Step::Capture).is_err());
}

#[test]
fn test_rejected_navigation_leaves_state_untouched() {
    let session = fresh_session();
    let before = session.snapshot();

    let err = session.navigate(NavAction::Retake).unwrap_err();

    assert!(matches!(err, SessionError::InvalidTransition { .. }));
    let after = session.snapshot();
    assert_eq!(after.step, before.step);
    assert_eq!(after.last_error, Some(err.to_string()));
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_step(), to in any_step()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            assert!(allowed.contains(&to));
        } else {
            assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_next_step_agrees_with_graph(from in any_step(), action in any_action()) {
        match next_step(from, action) {
            Ok(to) => {
                prop_assert!(allowed_actions(from).contains(&action));
                prop_assert!(validate_transition(from, to).is_ok());
            }
            Err(_) => prop_assert!(!allowed_actions(from).contains(&action)),
        }
    }

    #[test]
    fn prop_toggle_twice_restores_concerns(
        initial in proptest::collection::btree_set(any_concern(), 0..6),
        concern in any_concern(),
    ) {
        let session = fresh_session();
        for c in &initial {
            session.toggle_concern(*c).unwrap();
        }
        let before = session.snapshot().answers.concerns;

        session.toggle_concern(concern).unwrap();
        session.toggle_concern(concern).unwrap();

        prop_assert_eq!(session.snapshot().answers.concerns, before);
    }

    #[test]
    fn prop_session_stays_on_graph(ops in proptest::collection::vec(any_op(), 1..24)) {
        let session = fresh_session();
        let upload = jpeg_bytes(48, 40);

        for op in ops {
            let from = session.step();
            let result = match op {
                Op::Navigate(action) => session.navigate(action).map(|_| ()),
                Op::Toggle(concern) => session.toggle_concern(concern).map(|_| ()),
                Op::Consent(consent) => session.set_consent(consent),
                Op::Age(age) => session.set_answer(AnswerUpdate::Age(age)),
                Op::Upload => session.ingest_upload(&upload, "image/jpeg"),
                Op::Reset => {
                    session.reset();
                    Ok(())
                }
            };
            let state = session.snapshot();

            // a rejected action never moves the wizard
            if result.is_err() {
                prop_assert_eq!(state.step, from);
                prop_assert!(state.last_error.is_some());
            } else {
                prop_assert!(state.last_error.is_none());
            }
            if result.is_ok() {
                match op {
                    Op::Navigate(NavAction::NewSession) => prop_assert_eq!(state.step, Step::Intro),
                    Op::Navigate(action) => {
                        prop_assert_eq!(Ok(state.step), next_step(from, action));
                        prop_assert!(validate_transition(from, state.step).is_ok());
                    }
                    Op::Upload => prop_assert_eq!(state.step, Step::Review),
                    Op::Reset => prop_assert_eq!(state.step, Step::Intro),
                    Op::Toggle(_) | Op::Consent(_) | Op::Age(_) => prop_assert_eq!(state.step, from),
                }
            }
            if state.step == Step::Review {
                prop_assert!(state.image.is_some());
            }
            prop_assert!(!state.camera_active);
            prop_assert_eq!(state.submission, Submission::Idle);
            prop_assert_ne!(state.answers.age, Some(0));
        }
    }
}

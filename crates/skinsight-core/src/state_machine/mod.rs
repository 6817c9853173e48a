use crate::error::SessionError;
use crate::types::Step;
use std::fmt;

/// User navigation actions.
///
/// Capture, upload and submit also move the wizard, but they are operations
/// with their own preconditions on the session rather than plain navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavAction {
    BeginQuestionnaire,
    SkipToCapture,
    ContinueToCapture,
    Back,
    ReviewCapture,
    Retake,
    NewSession,
}

impl NavAction {
    pub const ALL: [NavAction; 7] = [
        NavAction::BeginQuestionnaire,
        NavAction::SkipToCapture,
        NavAction::ContinueToCapture,
        NavAction::Back,
        NavAction::ReviewCapture,
        NavAction::Retake,
        NavAction::NewSession,
    ];
}

impl fmt::Display for NavAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NavAction::BeginQuestionnaire => "begin questionnaire",
            NavAction::SkipToCapture => "skip to capture",
            NavAction::ContinueToCapture => "continue to capture",
            NavAction::Back => "go back",
            NavAction::ReviewCapture => "review capture",
            NavAction::Retake => "retake",
            NavAction::NewSession => "start a new session",
        };
        f.write_str(s)
    }
}

/// Navigation actions accepted on `step`.
pub fn allowed_actions(step: Step) -> Vec<NavAction> {
    use NavAction::*;
    match step {
        Step::Intro => vec![BeginQuestionnaire, SkipToCapture],
        Step::Questionnaire => vec![ContinueToCapture, Back],
        Step::Capture => vec![ReviewCapture, Back],
        Step::Review => vec![Retake],
        Step::Results => vec![Back, NewSession],
    }
}

/// Resolves the target of `action` on `step`.
///
/// Only the graph is consulted here; the image guard on `ReviewCapture`
/// belongs to the session.
pub fn next_step(step: Step, action: NavAction) -> Result<Step, SessionError> {
    use NavAction::*;
    let to = match (step, action) {
        (Step::Intro, BeginQuestionnaire) => Step::Questionnaire,
        (Step::Intro, SkipToCapture) => Step::Capture,
        (Step::Questionnaire, ContinueToCapture) => Step::Capture,
        (Step::Questionnaire, Back) => Step::Intro,
        (Step::Capture, ReviewCapture) => Step::Review,
        (Step::Capture, Back) => Step::Questionnaire,
        (Step::Review, Retake) => Step::Capture,
        (Step::Results, Back) => Step::Review,
        (Step::Results, NewSession) => Step::Intro,
        _ => return Err(SessionError::InvalidTransition { step, action }),
    };
    Ok(to)
}

/// Steps reachable from `from` in one transition.
///
/// `Review -> Results` has no navigation action; only a successful
/// submission takes it.
pub fn allowed_transitions(from: Step) -> Vec<Step> {
    let mut targets: Vec<Step> = allowed_actions(from)
        .into_iter()
        .filter_map(|action| next_step(from, action).ok())
        .collect();
    if from == Step::Review {
        targets.push(Step::Results);
    }
    targets
}

/// Validates a step change.
pub fn validate_transition(from: Step, to: Step) -> Result<(), SessionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SessionError::IllegalStepChange { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intro_edges() {
        assert_eq!(next_step(Step::Intro, NavAction::BeginQuestionnaire), Ok(Step::Questionnaire));
        assert_eq!(next_step(Step::Intro, NavAction::SkipToCapture), Ok(Step::Capture));
        assert!(next_step(Step::Intro, NavAction::Back).is_err());
    }

    #[test]
    fn review_only_retakes_by_navigation() {
        assert_eq!(allowed_actions(Step::Review), vec![NavAction::Retake]);
        assert!(validate_transition(Step::Review, Step::Results).is_ok());
        assert!(validate_transition(Step::Review, Step::Intro).is_err());
    }

    #[test]
    fn no_self_transitions() {
        for step in Step::ALL {
            assert!(validate_transition(step, step).is_err(), "{step:?}");
        }
    }

    #[test]
    fn rejected_action_is_reported() {
        let err = next_step(Step::Review, NavAction::NewSession).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                step: Step::Review,
                action: NavAction::NewSession,
            }
        );
    }
}

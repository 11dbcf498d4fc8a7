use helpdesk_core::domain::escalation::EscalationReason;
use helpdesk_core::domain::message::Intent;

pub const USER_REQUEST_REPLY: &str = "I am escalating this to a human agent. Please wait.";
pub const LOW_CONFIDENCE_REPLY: &str = "I am not confident in my answer. Escalating to human.";

/// Outcome of one escalation check. `override_text`, when present, replaces
/// whatever reply the turn had produced so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EscalationDecision {
    pub escalate: bool,
    pub reason: Option<EscalationReason>,
    pub override_text: Option<&'static str>,
}

impl EscalationDecision {
    pub fn hold() -> Self {
        Self::default()
    }

    /// Combine with a later check. Escalation is monotonic: once set it is
    /// never cleared. The earlier check keeps the recorded reason (an
    /// explicit user request outranks the confidence sweep), while the later
    /// check's override text wins because it runs last.
    pub fn merge(self, later: Self) -> Self {
        Self {
            escalate: self.escalate || later.escalate,
            reason: self.reason.or(later.reason),
            override_text: later.override_text.or(self.override_text),
        }
    }
}

/// Pure per-turn escalation policy: one check for explicit requests, one for
/// the confidence threshold.
#[derive(Clone, Copy, Debug, Default)]
pub struct EscalationPolicy;

impl EscalationPolicy {
    pub fn for_intent(&self, intent: Intent) -> EscalationDecision {
        if intent == Intent::Escalation {
            EscalationDecision {
                escalate: true,
                reason: Some(EscalationReason::UserRequest),
                override_text: Some(USER_REQUEST_REPLY),
            }
        } else {
            EscalationDecision::hold()
        }
    }

    /// Strictly-below comparison: a confidence equal to the threshold passes.
    pub fn for_confidence(&self, confidence: f64, threshold: f64) -> EscalationDecision {
        if confidence < threshold {
            EscalationDecision {
                escalate: true,
                reason: Some(EscalationReason::LowConfidence),
                override_text: Some(LOW_CONFIDENCE_REPLY),
            }
        } else {
            EscalationDecision::hold()
        }
    }
}

#[cfg(test)]
mod tests {
    use helpdesk_core::domain::escalation::EscalationReason;
    use helpdesk_core::domain::message::Intent;

    use super::{EscalationDecision, EscalationPolicy, LOW_CONFIDENCE_REPLY, USER_REQUEST_REPLY};

    #[test]
    fn escalation_intent_triggers_user_request() {
        let decision = EscalationPolicy.for_intent(Intent::Escalation);
        assert!(decision.escalate);
        assert_eq!(decision.reason, Some(EscalationReason::UserRequest));
        assert_eq!(decision.override_text, Some(USER_REQUEST_REPLY));
    }

    #[test]
    fn other_intents_hold() {
        for intent in [Intent::Informational, Intent::Transactional, Intent::Error] {
            assert_eq!(EscalationPolicy.for_intent(intent), EscalationDecision::hold());
        }
    }

    #[test]
    fn confidence_comparison_is_strictly_below() {
        assert!(EscalationPolicy.for_confidence(0.4, 0.5).escalate);
        assert!(!EscalationPolicy.for_confidence(0.5, 0.5).escalate);
        assert!(!EscalationPolicy.for_confidence(0.9, 0.5).escalate);
    }

    #[test]
    fn low_confidence_overrides_text_and_reason() {
        let decision = EscalationPolicy.for_confidence(0.3, 0.5);
        assert_eq!(decision.reason, Some(EscalationReason::LowConfidence));
        assert_eq!(decision.override_text, Some(LOW_CONFIDENCE_REPLY));
    }

    #[test]
    fn merge_is_monotonic_and_keeps_the_first_reason() {
        let first = EscalationPolicy.for_intent(Intent::Escalation);
        let second = EscalationPolicy.for_confidence(0.3, 0.5);

        let merged = first.merge(second);
        assert!(merged.escalate);
        assert_eq!(merged.reason, Some(EscalationReason::UserRequest));
        assert_eq!(merged.override_text, Some(LOW_CONFIDENCE_REPLY));

        let held = first.merge(EscalationDecision::hold());
        assert!(held.escalate);
        assert_eq!(held.override_text, Some(USER_REQUEST_REPLY));
    }
}

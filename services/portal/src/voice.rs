//! Voice approval state machine
//!
//! Drives an outbound approval call: prompt, collect a single digit,
//! branch on approve/reject/repeat/invalid, terminal action. The
//! functions here are pure — they decide what to speak, whether a
//! permission decision was reached and whether the call session ends;
//! the webhook handlers perform the side effects.

use crate::call_session::CallSession;
use crate::permission::{Channel, PermissionStatus};
use crate::twiml::VoiceDocument;

const MSG_NO_INPUT: &str = "Tuş girişi alınamadı. Arama sonlandırılıyor.";
const MSG_APPROVED: &str = "İzin talebiniz onaylandı. Teşekkür ederiz.";
const MSG_REJECTED: &str = "İzin talebiniz reddedildi. Teşekkür ederiz.";
const MSG_INVALID: &str = "Geçersiz seçim. Arama sonlandırılıyor.";
const MSG_SYSTEM_ERROR: &str = "Sistem hatası oluştu. Arama sonlandırılıyor.";

/// Webhook path of the entry state
pub fn entry_url(call_id: &str) -> String {
    format!("/api/voice/webhook?id={call_id}")
}

/// Webhook path of the digit-response state
pub fn response_url(call_id: &str) -> String {
    format!("/api/voice/response?id={call_id}")
}

fn approval_prompt(student_name: &str) -> String {
    format!(
        "Merhaba, izin portalından arıyoruz. Öğrenciniz {student_name} için izin talebi geldi. \
         Onaylamak için 1, reddetmek için 2, tekrar dinlemek için 3'e basın."
    )
}

/// Entry state: speak the prompt inside a one-digit gather, or fail the
/// call with a generic error.
///
/// A missing call id and an expired or unknown session are reported
/// identically: the caller cannot act on the distinction.
pub fn entry_document(session: Option<&CallSession>, call_id: &str) -> String {
    match session {
        Some(session) => VoiceDocument::new()
            .gather(1, &response_url(call_id), &approval_prompt(&session.student_name))
            .say(MSG_NO_INPUT)
            .hangup()
            .build(),
        None => error_document(),
    }
}

/// Generic spoken error plus hangup, used for any internal failure
pub fn error_document() -> String {
    VoiceDocument::new().say(MSG_SYSTEM_ERROR).hangup().build()
}

/// What the caller's digit means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitAction {
    Approve,
    Reject,
    Repeat,
    Invalid,
}

impl DigitAction {
    /// Classify the collected digit; anything unexpected (including no
    /// digit at all) is invalid
    pub fn from_digit(digit: Option<&str>) -> Self {
        match digit {
            Some("1") => DigitAction::Approve,
            Some("2") => DigitAction::Reject,
            Some("3") => DigitAction::Repeat,
            _ => DigitAction::Invalid,
        }
    }
}

/// Result of processing one digit
#[derive(Debug)]
pub struct DigitOutcome {
    /// Markup document answered to the provider
    pub document: String,
    /// Status to write into the row store, when a decision was reached
    pub decision: Option<PermissionStatus>,
    /// Whether the call session is finished
    pub end_session: bool,
}

/// Resolve a digit into its outcome.
///
/// `timestamp` is the label stamped into the row-store marker.
pub fn respond(action: DigitAction, call_id: &str, timestamp: &str) -> DigitOutcome {
    match action {
        DigitAction::Approve => DigitOutcome {
            document: VoiceDocument::new().say(MSG_APPROVED).hangup().build(),
            decision: Some(PermissionStatus::Approved {
                range: None,
                channel: Channel::Voice,
                at: timestamp.to_string(),
            }),
            end_session: true,
        },
        DigitAction::Reject => DigitOutcome {
            document: VoiceDocument::new().say(MSG_REJECTED).hangup().build(),
            decision: Some(PermissionStatus::Rejected {
                range: None,
                channel: Channel::Voice,
                at: timestamp.to_string(),
            }),
            end_session: true,
        },
        DigitAction::Repeat => DigitOutcome {
            // Back to the entry prompt, same call id, session retained
            document: VoiceDocument::new().redirect(&entry_url(call_id)).build(),
            decision: None,
            end_session: false,
        },
        DigitAction::Invalid => DigitOutcome {
            document: VoiceDocument::new().say(MSG_INVALID).hangup().build(),
            decision: Some(PermissionStatus::Invalid {
                channel: Channel::Voice,
                at: timestamp.to_string(),
            }),
            end_session: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CallSession {
        CallSession::new("Zeynep Yılmaz", "+905551234567")
    }

    #[test]
    fn entry_prompts_and_gathers_one_digit() {
        let doc = entry_document(Some(&session()), "abc123");

        assert!(doc.contains("Zeynep Yılmaz"));
        assert!(doc.contains("numDigits=\"1\""));
        assert!(doc.contains("/api/voice/response?id=abc123"));
        // No-input fallback still terminates the call
        assert!(doc.contains("<Hangup/>"));
    }

    #[test]
    fn entry_without_session_speaks_generic_error() {
        let doc = entry_document(None, "abc123");
        assert!(doc.contains("Sistem hatası"));
        assert!(doc.contains("<Hangup/>"));
        assert!(!doc.contains("Gather"));
    }

    #[test]
    fn digit_classification() {
        assert_eq!(DigitAction::from_digit(Some("1")), DigitAction::Approve);
        assert_eq!(DigitAction::from_digit(Some("2")), DigitAction::Reject);
        assert_eq!(DigitAction::from_digit(Some("3")), DigitAction::Repeat);
        assert_eq!(DigitAction::from_digit(Some("9")), DigitAction::Invalid);
        assert_eq!(DigitAction::from_digit(Some("")), DigitAction::Invalid);
        assert_eq!(DigitAction::from_digit(None), DigitAction::Invalid);
    }

    #[test]
    fn approve_ends_session_with_spoken_confirmation() {
        let outcome = respond(DigitAction::Approve, "abc123", "10.08.2025 14:30");

        assert!(outcome.end_session);
        assert!(outcome.document.contains("onaylandı"));
        assert!(outcome.document.contains("<Hangup/>"));
        assert!(matches!(
            outcome.decision,
            Some(PermissionStatus::Approved { channel: Channel::Voice, .. })
        ));
    }

    #[test]
    fn reject_ends_session_with_rejection_marker() {
        let outcome = respond(DigitAction::Reject, "abc123", "10.08.2025 14:30");

        assert!(outcome.end_session);
        assert!(outcome.document.contains("reddedildi"));
        assert_eq!(
            outcome.decision.unwrap().render(),
            "REDDEDİLDİ [Telefon: 10.08.2025 14:30]"
        );
    }

    #[test]
    fn repeat_redirects_to_same_call_id_and_keeps_session() {
        let outcome = respond(DigitAction::Repeat, "abc123", "10.08.2025 14:30");

        assert!(!outcome.end_session);
        assert!(outcome.decision.is_none());
        assert!(outcome
            .document
            .contains("<Redirect>/api/voice/webhook?id=abc123</Redirect>"));
    }

    #[test]
    fn invalid_digit_ends_session_with_invalid_marker() {
        let outcome = respond(DigitAction::Invalid, "abc123", "10.08.2025 14:30");

        assert!(outcome.end_session);
        assert!(outcome.document.contains("Geçersiz seçim"));
        assert!(matches!(
            outcome.decision,
            Some(PermissionStatus::Invalid { .. })
        ));
    }
}

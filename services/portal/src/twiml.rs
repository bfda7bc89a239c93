//! Voice markup documents for the telephony provider
//!
//! The webhook endpoints answer with a TwiML document telling the
//! provider what to speak and where to route next. Documents are always
//! well-formed and always end in a terminal instruction or a redirect.

/// Voice used for every spoken message
const VOICE: &str = "Polly.Filiz";
/// Spoken language
const LANGUAGE: &str = "tr-TR";

/// Builder for one voice response document
#[derive(Debug, Default)]
pub struct VoiceDocument {
    body: String,
}

impl VoiceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speak a message
    pub fn say(mut self, message: &str) -> Self {
        self.body.push_str(&format!(
            "  <Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">{}</Say>\n",
            escape_xml(message)
        ));
        self
    }

    /// Speak a prompt and collect a fixed number of digits, posting the
    /// result to `action`
    pub fn gather(mut self, num_digits: u32, action: &str, message: &str) -> Self {
        self.body.push_str(&format!(
            "  <Gather numDigits=\"{num_digits}\" action=\"{}\" method=\"POST\">\n    <Say voice=\"{VOICE}\" language=\"{LANGUAGE}\">{}</Say>\n  </Gather>\n",
            escape_xml(action),
            escape_xml(message)
        ));
        self
    }

    /// Redirect the call to another webhook
    pub fn redirect(mut self, url: &str) -> Self {
        self.body
            .push_str(&format!("  <Redirect>{}</Redirect>\n", escape_xml(url)));
        self
    }

    /// End the call
    pub fn hangup(mut self) -> Self {
        self.body.push_str("  <Hangup/>\n");
        self
    }

    /// Produce the final document
    pub fn build(self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n{}</Response>",
            self.body
        )
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_and_hangup_document() {
        let doc = VoiceDocument::new().say("Merhaba").hangup().build();

        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains("<Say voice=\"Polly.Filiz\" language=\"tr-TR\">Merhaba</Say>"));
        assert!(doc.contains("<Hangup/>"));
        assert!(doc.trim_end().ends_with("</Response>"));
    }

    #[test]
    fn gather_carries_action_and_digit_count() {
        let doc = VoiceDocument::new()
            .gather(1, "/api/voice/response?id=abc", "Bir tuşa basın")
            .say("Tuş girişi alınamadı.")
            .hangup()
            .build();

        assert!(doc.contains("<Gather numDigits=\"1\" action=\"/api/voice/response?id=abc\" method=\"POST\">"));
        assert!(doc.contains("</Gather>"));
    }

    #[test]
    fn redirect_document() {
        let doc = VoiceDocument::new().redirect("/api/voice/webhook?id=abc").build();
        assert!(doc.contains("<Redirect>/api/voice/webhook?id=abc</Redirect>"));
    }

    #[test]
    fn escapes_markup_in_text() {
        let doc = VoiceDocument::new().say("a < b & c").build();
        assert!(doc.contains("a &lt; b &amp; c"));
        assert!(!doc.contains("a < b"));
    }
}

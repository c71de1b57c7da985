//! Feedback messages sent to the admins.

use serde::{Deserialize, Serialize};

use crate::ids::FeedbackId;

/// Label shown for feedback without a sender email.
pub const ANONYMOUS_SENDER: &str = "Anonymous";

/// A feedback message under `feedback/{id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feedback {
    #[serde(skip)]
    pub id: FeedbackId,
    pub message: String,
    /// Unix millis.
    pub created_at: u64,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
}

impl Feedback {
    pub fn from_value(id: FeedbackId, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut feedback: Feedback = serde_json::from_value(value)?;
        feedback.id = id;
        Ok(feedback)
    }

    pub fn sender(&self) -> &str {
        self.user_email.as_deref().unwrap_or(ANONYMOUS_SENDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_defaults_to_anonymous() {
        let fb = Feedback::from_value(
            FeedbackId::new("f1"),
            serde_json::json!({"message": "hola", "createdAt": 3}),
        )
        .unwrap();
        assert_eq!(fb.sender(), ANONYMOUS_SENDER);
        assert!(!fb.read);
        assert_eq!(fb.id.as_str(), "f1");
    }
}

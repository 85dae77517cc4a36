//! What the dispatcher hands back to the chat platform. Nothing in here knows
//! about serenity; `render` turns these into messages.

use std::time::Duration;

/// Identity of a user as supplied by the platform.
pub type UserKey = u64;

/// Shown publicly when a generated code could not be sent privately.
pub const DM_FAILED: &str = "I couldn't send you a DM. Please check your privacy settings.";

/// Colour family of an embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Danger,
    Gift,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// A structured payload, rendered as an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub tone: Tone,
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub footer: Option<String>,
}

impl Card {
    pub fn new(tone: Tone) -> Self {
        Self {
            tone,
            title: None,
            description: None,
            fields: Vec::new(),
            footer: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Card(Card),
}

impl From<Card> for Payload {
    fn from(card: Card) -> Self {
        Payload::Card(card)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

/// Why a command was refused before it touched the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The caller lacks the capability needed to `action`
    Unauthorized { action: &'static str },

    /// Generation cooldown still running
    OnCooldown(Duration),

    /// The short global limiter tripped. Never answered, to avoid feeding spam.
    RateLimited(Duration),
}

impl Rejection {
    /// The text to reply with, if the rejection is reported at all.
    pub fn reason(&self) -> Option<String> {
        match self {
            Rejection::Unauthorized { action } => {
                Some(format!("❌ You don't have permission to {action}."))
            }
            Rejection::OnCooldown(remaining) => {
                let secs = remaining.as_secs();
                Some(format!(
                    "⏳ You are on cooldown. Try again in {}h {}m.",
                    secs / 3600,
                    (secs % 3600) / 60
                ))
            }
            Rejection::RateLimited(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Reply in the channel the command came from.
    PublicReply(Payload),

    /// Deliver `payload` to `target` privately after announcing it publicly
    /// with `notice`. Only used for generated codes.
    PrivateReply {
        target: UserKey,
        notice: Payload,
        payload: Payload,
    },

    Rejected(Rejection),
}

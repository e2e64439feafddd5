use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const PRIORITY_PRIMARY: &str = "primary";
pub const PRIORITY_MUTED: &str = "muted";
pub const MEDIA_IMAGE: &str = "image";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("frame is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One decoded inbound frame. The shape belongs to the server; the client only
/// needs it to be renderable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Message(Value);

impl Message {
    pub fn decode(frame: &str) -> Result<Self, MessageError> {
        Ok(Self(serde_json::from_str(frame)?))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Best-effort typed view over the fields the chat server emits.
    pub fn chat_line(&self) -> ChatLine<'_> {
        let field = |name: &str| {
            self.0
                .get(name)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        };
        ChatLine {
            sender: field("sender"),
            data: field("data"),
            priority: Priority::from_field(field("priority")),
            media: field("media"),
        }
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Primary,
    #[default]
    Normal,
    Muted,
}

impl Priority {
    fn from_field(raw: Option<&str>) -> Self {
        match raw {
            Some(PRIORITY_PRIMARY) => Priority::Primary,
            Some(PRIORITY_MUTED) => Priority::Muted,
            _ => Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatLine<'a> {
    pub sender: Option<&'a str>,
    pub data: Option<&'a str>,
    pub priority: Priority,
    pub media: Option<&'a str>,
}

impl ChatLine<'_> {
    pub fn is_image(&self) -> bool {
        self.media == Some(MEDIA_IMAGE)
    }

    /// Body text as shown in the history; `None` when the message carries no
    /// `data` field and the caller should fall back to the raw json.
    pub fn body(&self) -> Option<String> {
        let data = self.data?;
        if self.is_image() {
            Some(format!("[image] {data}"))
        } else {
            Some(data.to_string())
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Marker prefix identifying image content in the persisted message form
pub const IMAGE_CONTENT_MARKER: &str = "IMAGE:";

/// Title used for a session that has no messages yet
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Maximum number of characters kept from the first user message in a title
pub const TITLE_MAX_CHARS: usize = 30;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person at the keyboard
    User,
    /// Produced by the remote service (or synthesized on failure)
    Assistant,
}

/// Body of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// A reference to a generated image
    Image {
        /// Locator returned by the image endpoint
        url: String,
    },
}

impl MessageContent {
    /// Returns true for image references
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// Human-readable text of the content
    ///
    /// Image content yields its URL.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Image { url } => url,
        }
    }
}

/// One turn in a session
///
/// Serialized as `{ id, role, content, is_image }` where image content is
/// written as [`IMAGE_CONTENT_MARKER`] followed by the URL.
///
/// # Examples
///
/// ```
/// use chatdeck::session::{Message, MessageContent, Role};
///
/// let msg = Message::image("https://img.example/fox.png");
/// assert_eq!(msg.role, Role::Assistant);
/// assert!(msg.content.is_image());
///
/// let json = serde_json::to_value(&msg).unwrap();
/// assert_eq!(json["content"], "IMAGE:https://img.example/fox.png");
/// assert_eq!(json["is_image"], true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MessageRecord", into = "MessageRecord")]
pub struct Message {
    /// Unique message identifier (ULID)
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Body of the message
    pub content: MessageContent,
    /// Text actually sent to the service, when it differs from the displayed content
    pub prompt: Option<String>,
}

impl Message {
    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: MessageContent::Text(content.into()),
            prompt: None,
        }
    }

    /// Creates a user message whose request differs from what is displayed
    pub fn user_with_prompt(display: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::user(display)
        }
    }

    /// Creates an assistant text message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
            prompt: None,
        }
    }

    /// Creates an assistant image message
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: MessageContent::Image { url: url.into() },
            prompt: None,
        }
    }

    /// The request text to resubmit when regenerating from this message
    pub fn request_text(&self) -> &str {
        self.prompt
            .as_deref()
            .unwrap_or_else(|| self.content.as_text())
    }
}

/// Persisted shape of a [`Message`]
#[derive(Serialize, Deserialize)]
struct MessageRecord {
    id: String,
    role: Role,
    content: String,
    #[serde(default)]
    is_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        let (content, is_image) = match message.content {
            MessageContent::Text(text) => (text, false),
            MessageContent::Image { url } => (format!("{}{}", IMAGE_CONTENT_MARKER, url), true),
        };
        Self {
            id: message.id,
            role: message.role,
            content,
            is_image,
            prompt: message.prompt,
        }
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        let content = if record.is_image {
            let url = record
                .content
                .strip_prefix(IMAGE_CONTENT_MARKER)
                .unwrap_or(&record.content)
                .to_string();
            MessageContent::Image { url }
        } else {
            MessageContent::Text(record.content)
        };
        Self {
            id: record.id,
            role: record.role,
            content,
            prompt: record.prompt,
        }
    }
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier (ULID, time-ordered)
    pub id: String,
    /// Short title derived from the first user message
    pub title: String,
    /// Messages in append order
    pub messages: Vec<Message>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with a fresh id
    pub fn new() -> Self {
        Self {
            id: new_session_id(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Most recent user message, if any
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a session title from the first user message
///
/// Keeps the first 30 characters and appends `...` when the text was longer.
///
/// # Examples
///
/// ```
/// use chatdeck::session::derive_title;
///
/// assert_eq!(derive_title("hello"), "hello");
/// assert_eq!(
///     derive_title("abcdefghijklmnopqrstuvwxyz0123456789"),
///     "abcdefghijklmnopqrstuvwxyz0123..."
/// );
/// ```
pub fn derive_title(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Generate a new ULID for a session
pub fn new_session_id() -> String {
    Ulid::new().to_string()
}

/// Generate a new ULID for a message
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}

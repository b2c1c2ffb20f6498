use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ChannelId);
id_newtype!(SenderId);

/// One user command as it arrived from a front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: SenderId,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(channel_id: &str, sender_id: &str, content: impl Into<String>) -> Self {
        Self {
            message_id: MessageId::new(uuid::Uuid::new_v4().to_string()),
            channel_id: ChannelId::new(channel_id),
            sender_id: SenderId::new(sender_id),
            content: content.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    /// Answer to an inbound message.
    #[default]
    Reply,
    /// Unprompted output such as a due reminder or the greeting.
    Notice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    #[serde(default)]
    pub kind: OutboundKind,
    #[serde(default)]
    pub reply_to_message_id: Option<MessageId>,
}

impl OutboundMessage {
    pub fn reply(content: impl Into<String>, to: &MessageId) -> Self {
        Self {
            content: content.into(),
            kind: OutboundKind::Reply,
            reply_to_message_id: Some(to.clone()),
        }
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: OutboundKind::Notice,
            reply_to_message_id: None,
        }
    }
}

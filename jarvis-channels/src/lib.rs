//! Front ends for the Jarvis assistant.
//!
//! Adapters are pure I/O: they turn user input into [`InboundMessage`]s and
//! deliver [`OutboundMessage`]s back. Everything in between belongs to the app.

mod console;
mod traits;
mod types;

pub use console::{CONSOLE_CHANNEL, CONSOLE_SENDER, ConsoleAdapter};
pub use traits::ChannelAdapter;
pub use types::{ChannelId, InboundMessage, MessageId, OutboundKind, OutboundMessage, SenderId};

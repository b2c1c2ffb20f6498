//! Local actions for the Jarvis assistant.
//!
//! Every action is a [`ToolKind`] with typed arguments. Model output is turned
//! into a [`ToolInvocation`] before anything runs, and [`ToolBox::execute`]
//! performs it against an [`Automation`] boundary and the JSON [`Stores`].

mod apps;
mod automation;
mod calendar;
mod catalog;
mod error;
mod files;
mod invocation;
mod memory;
mod reminders;
mod store;
mod system;
mod tasks;
mod timeparse;
mod toolbox;
mod web;

pub use apps::resolve_app_name;
pub use automation::{Automation, CommandOutput, HostAutomation, Invocation, RecordingAutomation};
pub use calendar::{CalendarClient, CalendarSettings, CreatedEvent};
pub use catalog::{tool_definition, tool_definitions};
pub use error::{Result, ToolError};
pub use files::Locations;
pub use invocation::{InfoType, MusicPlatform, ToolInvocation, ToolKind, parse_arguments};
pub use memory::{MUSIC_PREFERENCE, MemoryRecord, MemoryStore};
pub use reminders::{Reminder, ReminderPolicy, ReminderStore, describe_time};
pub use store::{Document, JsonStore};
pub use tasks::{Completion, Task, TaskStore};
pub use timeparse::parse_when;
pub use toolbox::{Stores, ToolBox, ToolOutcome, tool_names};
pub use web::normalize_url;

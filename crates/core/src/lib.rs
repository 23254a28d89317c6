pub mod command;
pub mod config;
pub mod disk;
pub mod error;
pub mod host;
pub mod prompt;

pub use command::{settle, Check, CommandOutput, CommandRunner, Invocation, SystemRunner};
#[cfg(any(test, feature = "mock"))]
pub use command::MockCommandRunner;
pub use config::{HostConfig, Platform, ToolSet};
pub use disk::{dedup_by_path, device_name, Disk, Placement};
pub use error::{FlashError, FlashResult};
pub use host::HostBackend;
pub use prompt::{Prompt, TerminalPrompt};
#[cfg(any(test, feature = "mock"))]
pub use prompt::ScriptedPrompt;

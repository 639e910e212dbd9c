mod command_registry;
mod parser;

pub use command_registry::{CommandHelp, SESSION_HELP};
pub use parser::{parse_command, parse_points, ModeChoice, SessionCommand, ViewChoice};

pub mod command;
pub mod command_handler;
pub mod context;
pub mod error;

pub use command::Command;
pub use command_handler::CommandHandler;
pub use context::AppContext;
pub use error::CommandError;

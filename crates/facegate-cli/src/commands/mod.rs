use std::any::Any;
use std::path::PathBuf;
use std::process::ExitCode;

use facegate_core::errors::AppResult;

use crate::cli::{Commands, OutputMode};

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod faces;
mod status;
mod token;

pub use faces::{FacesHandler, FacesHandlerDeps};
pub use status::StatusHandler;
pub use token::TokenHandler;

/// Builds the handler for `command`, reading configuration from
/// `config_path` or the default locations.
pub fn handler_for(command: Commands, config_path: Option<PathBuf>) -> Box<dyn CommandHandler> {
    match command {
        Commands::Faces(cmd) => Box::new(FacesHandler::new(cmd, config_path)),
        Commands::Status => Box::new(StatusHandler::new(config_path)),
        Commands::Token(cmd) => Box::new(TokenHandler::new(cmd, config_path)),
    }
}

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        handler_for(command, None)
    }
}

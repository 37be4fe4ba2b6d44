use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use facegate_core::errors::AppResult;

use crate::cli::{OutputMode, TokenCommands, TokenIssueArgs};
use crate::commands::CommandHandler;
use crate::output::render_token;
use crate::runtime::{self, IssuedToken};

type IssueFn = dyn Fn(Option<&Path>, &TokenIssueArgs) -> AppResult<IssuedToken> + Send + Sync;

pub struct TokenHandler {
    command: TokenCommands,
    config_path: Option<PathBuf>,
    issue: Box<IssueFn>,
    render: Box<dyn Fn(&IssuedToken, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl TokenHandler {
    pub fn new(command: TokenCommands, config_path: Option<PathBuf>) -> Self {
        Self::with_dependencies(command, config_path, issue_from_config, render_token)
    }

    pub fn with_dependencies(
        command: TokenCommands,
        config_path: Option<PathBuf>,
        issue: impl Fn(Option<&Path>, &TokenIssueArgs) -> AppResult<IssuedToken>
            + Send
            + Sync
            + 'static,
        render: impl Fn(&IssuedToken, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command,
            config_path,
            issue: Box::new(issue),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for TokenHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            TokenCommands::Issue(args) => {
                let issued = (self.issue)(self.config_path.as_deref(), args)?;
                tracing::info!(subject = %issued.subject, "issued bearer token");
                (self.render)(&issued, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn issue_from_config(config_path: Option<&Path>, args: &TokenIssueArgs) -> AppResult<IssuedToken> {
    runtime::issue_token(
        config_path,
        &args.subject,
        args.email.as_deref(),
        args.role.as_deref(),
    )
}

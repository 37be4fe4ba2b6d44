use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use facegate_core::errors::AppResult;
use facegate_core::faces::{
    DeletionOutcome, EnrolledIdentities, EnrollmentOutcome, VerificationOutcome,
};

use crate::cli::{FacesCommands, OutputMode};
use crate::commands::CommandHandler;
use crate::output::{render_delete, render_enroll, render_list, render_verify};
use crate::runtime::{self, CliEngine};

pub struct FacesHandler {
    command: FacesCommands,
    config_path: Option<PathBuf>,
    deps: FacesHandlerDeps,
}

pub struct FacesHandlerDeps {
    pub open_engine: Box<dyn Fn(Option<&Path>) -> AppResult<CliEngine> + Send + Sync>,
    pub read_features: Box<dyn Fn(&Path) -> AppResult<Vec<u8>> + Send + Sync>,
    pub render_enroll: Box<dyn Fn(&EnrollmentOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_verify:
        Box<dyn Fn(&VerificationOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_list: Box<dyn Fn(&EnrolledIdentities, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_delete: Box<dyn Fn(&DeletionOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl FacesHandlerDeps {
    pub fn new(
        open_engine: impl Fn(Option<&Path>) -> AppResult<CliEngine> + Send + Sync + 'static,
        read_features: impl Fn(&Path) -> AppResult<Vec<u8>> + Send + Sync + 'static,
        render_enroll: impl Fn(&EnrollmentOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_verify: impl Fn(&VerificationOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_list: impl Fn(&EnrolledIdentities, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_delete: impl Fn(&DeletionOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            open_engine: Box::new(open_engine),
            read_features: Box::new(read_features),
            render_enroll: Box::new(render_enroll),
            render_verify: Box::new(render_verify),
            render_list: Box::new(render_list),
            render_delete: Box::new(render_delete),
        }
    }
}

impl Default for FacesHandlerDeps {
    fn default() -> Self {
        Self::new(
            runtime::open_engine,
            runtime::read_features,
            render_enroll,
            render_verify,
            render_list,
            render_delete,
        )
    }
}

impl FacesHandler {
    pub fn new(command: FacesCommands, config_path: Option<PathBuf>) -> Self {
        Self::with_dependencies(command, config_path, FacesHandlerDeps::default())
    }

    pub fn with_dependencies(
        command: FacesCommands,
        config_path: Option<PathBuf>,
        deps: FacesHandlerDeps,
    ) -> Self {
        Self {
            command,
            config_path,
            deps,
        }
    }
}

impl CommandHandler for FacesHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        // Feature files are read before the store is opened so a bad path
        // fails without touching persisted state.
        match &self.command {
            FacesCommands::Enroll(args) => {
                let features = (self.deps.read_features)(&args.features)?;
                let engine = (self.deps.open_engine)(self.config_path.as_deref())?;
                let outcome = engine.enroll(args.token.as_deref(), &features)?;
                (self.deps.render_enroll)(&outcome, mode)?;
            }
            FacesCommands::Verify(args) => {
                let features = (self.deps.read_features)(&args.features)?;
                let engine = (self.deps.open_engine)(self.config_path.as_deref())?;
                let outcome = engine.verify(args.token.as_deref(), &features)?;
                (self.deps.render_verify)(&outcome, mode)?;
                if !outcome.accepted {
                    return Ok(ExitCode::from(1));
                }
            }
            FacesCommands::List(args) => {
                let engine = (self.deps.open_engine)(self.config_path.as_deref())?;
                let listing = engine.list_enrolled(args.token.as_deref())?;
                (self.deps.render_list)(&listing, mode)?;
            }
            FacesCommands::Delete(args) => {
                let engine = (self.deps.open_engine)(self.config_path.as_deref())?;
                let outcome = engine.delete(args.token.as_deref(), &args.identity)?;
                (self.deps.render_delete)(&outcome, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

use std::any::Any;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use facegate_core::errors::AppResult;

use crate::cli::OutputMode;
use crate::commands::CommandHandler;
use crate::output::render_status;
use crate::runtime::{self, StatusReport};

pub struct StatusHandler {
    config_path: Option<PathBuf>,
    collect: Box<dyn Fn(Option<&Path>) -> AppResult<StatusReport> + Send + Sync>,
    render: Box<dyn Fn(&StatusReport, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl StatusHandler {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self::with_dependencies(config_path, runtime::collect_status, render_status)
    }

    pub fn with_dependencies(
        config_path: Option<PathBuf>,
        collect: impl Fn(Option<&Path>) -> AppResult<StatusReport> + Send + Sync + 'static,
        render: impl Fn(&StatusReport, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config_path,
            collect: Box::new(collect),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for StatusHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let report = (self.collect)(self.config_path.as_deref())?;
        (self.render)(&report, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const TOKEN_ENV: &str = "FACEGATE_TOKEN";

#[derive(Debug, Parser)]
#[command(
    name = "facegate",
    about = "Enroll faces and verify identities against enrolled encodings",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Read configuration from this file instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Enroll, verify, list and delete face encodings
    #[command(subcommand)]
    Faces(FacesCommands),
    /// Report configuration and enrollment statistics
    Status,
    /// Bearer token utilities
    #[command(subcommand)]
    Token(TokenCommands),
}

#[derive(Debug, Clone, Subcommand)]
pub enum FacesCommands {
    /// Enroll the face in a feature file for the authenticated identity
    Enroll(FaceEnrollArgs),
    /// Match the face in a feature file against every enrollment
    Verify(FaceVerifyArgs),
    /// List enrolled identities
    List(FaceListArgs),
    /// Delete every encoding of an identity
    Delete(FaceDeleteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FaceEnrollArgs {
    /// Face extraction summary (JSON) describing the submitted image
    #[arg(long)]
    pub features: PathBuf,

    /// Bearer token or `Bearer <token>` authorization value
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FaceVerifyArgs {
    /// Face extraction summary (JSON) describing the submitted image
    #[arg(long)]
    pub features: PathBuf,

    /// Optional bearer token; verification also runs anonymously
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FaceListArgs {
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct FaceDeleteArgs {
    /// Identity whose encodings are removed
    pub identity: String,

    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum TokenCommands {
    /// Sign a token with the configured secret
    Issue(TokenIssueArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TokenIssueArgs {
    #[arg(long)]
    pub subject: String,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

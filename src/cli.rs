// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `devdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "devdag",
    version,
    about = "Build, deploy, test and publish the modules of a project, in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the project config file (TOML).
    ///
    /// Default: `devdag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "devdag.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEVDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Maximum number of tasks processed at the same time. Overrides
    /// `[project].concurrency`.
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build modules and their build dependencies.
    Build(BuildArgs),
    /// Deploy services, building and pushing their modules first.
    Deploy(DeployArgs),
    /// Run the tests of modules.
    Test(TestArgs),
    /// Publish modules.
    Publish(PublishArgs),
    /// Deploy a service's dependencies, then run the service in the foreground.
    Run(RunArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Modules to build. Builds every module when empty.
    pub modules: Vec<String>,

    /// Rebuild even if the current version is already built.
    #[arg(long)]
    pub force: bool,

    /// Keep running and rebuild when sources change.
    #[arg(long, short)]
    pub watch: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// Services to deploy. Deploys every service when empty.
    pub services: Vec<String>,

    /// Redeploy even if the current version is already running.
    #[arg(long)]
    pub force: bool,

    /// Rebuild modules even if the current version is already built.
    #[arg(long)]
    pub force_build: bool,

    /// Keep running and redeploy when sources change.
    #[arg(long, short)]
    pub watch: bool,

    /// Services to hot reload instead of redeploying on change. Implies
    /// `--watch`.
    #[arg(long, value_delimiter = ',', value_name = "SERVICES")]
    pub hot_reload: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TestArgs {
    /// Modules to test. Tests every module when empty.
    pub modules: Vec<String>,

    /// Only run the test with this name.
    #[arg(long, short)]
    pub name: Option<String>,

    /// Re-run tests even if they passed for the current version.
    #[arg(long)]
    pub force: bool,

    /// Rebuild modules even if the current version is already built.
    #[arg(long)]
    pub force_build: bool,

    /// Keep running and re-run tests when sources change.
    #[arg(long, short)]
    pub watch: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PublishArgs {
    /// Modules to publish. Publishes every module when empty.
    pub modules: Vec<String>,

    /// Rebuild modules even if the current version is already built.
    #[arg(long)]
    pub force_build: bool,

    /// Publish modules with uncommitted changes.
    #[arg(long)]
    pub allow_dirty: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// The service to run.
    pub service: String,
}

impl Command {
    /// Whether the command keeps watching sources after the first run.
    pub fn watches(&self) -> bool {
        match self {
            Command::Build(args) => args.watch,
            Command::Deploy(args) => args.watch || !args.hot_reload.is_empty(),
            Command::Test(args) => args.watch,
            Command::Publish(_) | Command::Run(_) => false,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_deploy_with_hot_reload() {
        let args = CliArgs::try_parse_from([
            "devdag",
            "--concurrency",
            "2",
            "deploy",
            "api",
            "--hot-reload",
            "api,worker",
        ])
        .unwrap();

        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.config, "devdag.toml");
        match &args.command {
            Command::Deploy(deploy) => {
                assert_eq!(deploy.services, vec!["api"]);
                assert_eq!(deploy.hot_reload, vec!["api", "worker"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(args.command.watches());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from(["devdag", "build", "--force", "--config", "other.toml"]).unwrap();
        assert_eq!(args.config, "other.toml");
        assert!(!args.command.watches());
    }
}

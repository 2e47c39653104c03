use clap::{CommandFactory, Parser, Subcommand};

use crate::commands;

/// hs - develop HubSpot projects against a remote account
#[derive(Parser)]
#[command(name = "hs")]
#[command(version, disable_version_flag = true)]
#[command(about = "hs - develop HubSpot projects against a remote account")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show version
    #[arg(long, global = true)]
    pub version: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project commands: local development, upload, deploy
    #[command(subcommand)]
    Project(ProjectCommands),
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Start local development against a remote account
    Dev {
        /// Account the project lives in (defaults to the configured default)
        #[arg(long)]
        account: Option<u64>,

        /// Account to test against (defaults to the project account)
        #[arg(long = "testing-account")]
        testing_account: Option<u64>,

        /// Run in this directory (defaults to current directory)
        #[arg(value_name = "DIR")]
        dir: Option<std::path::PathBuf>,
    },

    /// Upload the project and wait for its build
    Upload {
        /// Account to upload to (defaults to the configured default)
        #[arg(long)]
        account: Option<u64>,

        /// Run in this directory (defaults to current directory)
        #[arg(value_name = "DIR")]
        dir: Option<std::path::PathBuf>,
    },

    /// Deploy the latest uploaded build
    Deploy {
        /// Account to deploy to (defaults to the configured default)
        #[arg(long)]
        account: Option<u64>,

        /// Deploy even when the remote validation reports warnings
        #[arg(long)]
        force: bool,

        /// Run in this directory (defaults to current directory)
        #[arg(value_name = "DIR")]
        dir: Option<std::path::PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if self.version {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let Some(command) = self.command else {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        };

        match command {
            Commands::Project(command) => {
                let rt = tokio::runtime::Runtime::new()?;
                match command {
                    ProjectCommands::Dev {
                        account,
                        testing_account,
                        dir,
                    } => {
                        if let Some(dir) = dir {
                            std::env::set_current_dir(dir)?;
                        }
                        rt.block_on(commands::dev::run(account, testing_account))
                    }
                    ProjectCommands::Upload { account, dir } => {
                        if let Some(dir) = dir {
                            std::env::set_current_dir(dir)?;
                        }
                        rt.block_on(commands::upload::run(account))
                    }
                    ProjectCommands::Deploy {
                        account,
                        force,
                        dir,
                    } => {
                        if let Some(dir) = dir {
                            std::env::set_current_dir(dir)?;
                        }
                        rt.block_on(commands::deploy::run(account, force))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn project_dev_parses_account_flags() {
        let cli = Cli::try_parse_from([
            "hs",
            "project",
            "dev",
            "--account",
            "123",
            "--testing-account",
            "456",
        ])
        .unwrap();
        let Some(Commands::Project(ProjectCommands::Dev {
            account,
            testing_account,
            dir,
        })) = cli.command
        else {
            panic!("expected Project::Dev");
        };
        assert_eq!(account, Some(123));
        assert_eq!(testing_account, Some(456));
        assert!(dir.is_none());
    }

    #[test]
    fn project_dev_without_flags_parses_for_default_account() {
        let cli = Cli::try_parse_from(["hs", "project", "dev"]).unwrap();
        let Some(Commands::Project(ProjectCommands::Dev {
            account,
            testing_account,
            ..
        })) = cli.command
        else {
            panic!("expected Project::Dev");
        };
        assert!(account.is_none());
        assert!(testing_account.is_none());
    }

    #[test]
    fn project_dev_parses_directory_argument() {
        let cli = Cli::try_parse_from(["hs", "project", "dev", "my-project"]).unwrap();
        let Some(Commands::Project(ProjectCommands::Dev { dir, .. })) = cli.command else {
            panic!("expected Project::Dev");
        };
        assert_eq!(dir.as_deref(), Some(std::path::Path::new("my-project")));
    }

    #[test]
    fn project_dev_rejects_non_numeric_account() {
        let res = Cli::try_parse_from(["hs", "project", "dev", "--account", "sandbox"]);
        match res {
            Ok(_) => panic!("expected parse failure"),
            Err(err) => assert!(
                err.to_string().contains("invalid value 'sandbox'"),
                "unexpected error: {err}"
            ),
        }
    }

    #[test]
    fn project_upload_parses_account() {
        let cli =
            Cli::try_parse_from(["hs", "project", "upload", "--account", "123"]).unwrap();
        let Some(Commands::Project(ProjectCommands::Upload { account, .. })) = cli.command
        else {
            panic!("expected Project::Upload");
        };
        assert_eq!(account, Some(123));
    }

    #[test]
    fn project_deploy_parses_force_flag() {
        let cli = Cli::try_parse_from(["hs", "project", "deploy", "--force"]).unwrap();
        let Some(Commands::Project(ProjectCommands::Deploy { force, account, .. })) =
            cli.command
        else {
            panic!("expected Project::Deploy");
        };
        assert!(force);
        assert!(account.is_none());
    }

    #[test]
    fn project_deploy_defaults_force_off() {
        let cli = Cli::try_parse_from(["hs", "project", "deploy"]).unwrap();
        let Some(Commands::Project(ProjectCommands::Deploy { force, .. })) = cli.command
        else {
            panic!("expected Project::Deploy");
        };
        assert!(!force);
    }

    #[test]
    fn top_level_dev_command_is_not_available() {
        let res = Cli::try_parse_from(["hs", "dev"]);
        match res {
            Ok(_) => panic!("expected parse failure"),
            Err(err) => assert!(
                err.to_string().contains("unrecognized subcommand 'dev'"),
                "unexpected error: {err}"
            ),
        }
    }

    #[test]
    fn verbose_flag_is_global() {
        let cli = Cli::try_parse_from(["hs", "project", "upload", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}

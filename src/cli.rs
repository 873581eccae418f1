use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::commands::{
    AuthCommand, CompletionsCommand, ConfigureCommand, EnvCommand, ListCommand,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "samlsts", version, about = "Temporary AWS credentials through SAML federation with Okta or OneLogin", long_about = None, arg_required_else_help = false)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        default_value = "default",
        help = "Profile name (configuration and credentials)"
    )]
    pub profile: String,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Authenticate with the identity provider and obtain AWS credentials")]
    Auth(AuthCommand),
    #[command(about = "List stored profiles whose credentials are still valid")]
    List(ListCommand),
    #[command(about = "Print shell exports for a stored profile")]
    Env(EnvCommand),
    #[command(about = "Configure the identity provider and profile settings")]
    Configure(ConfigureCommand),
    #[command(about = "Generate shell completion scripts for samlsts")]
    Completions(CompletionsCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let profile = self.profile;
        let command = self
            .command
            .unwrap_or_else(|| Commands::Auth(AuthCommand::default()));

        match command {
            Commands::Auth(cmd) => cmd.execute(&profile).await,
            Commands::List(cmd) => cmd.execute().await,
            Commands::Env(cmd) => cmd.execute(&profile).await,
            Commands::Configure(cmd) => cmd.execute(&profile).await,
            Commands::Completions(cmd) => cmd.execute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellFlavor;
    use clap::{CommandFactory, error::ErrorKind};

    #[test]
    fn test_default_command_is_auth() {
        let cli = Cli {
            profile: "default".to_string(),
            verbose: 0,
            command: None,
        };

        match cli
            .command
            .unwrap_or_else(|| Commands::Auth(AuthCommand::default()))
        {
            Commands::Auth(cmd) => {
                assert_eq!(cmd.role, None);
                assert!(!cmd.env);
            }
            _ => panic!("Expected Auth command as default"),
        }
    }

    #[test]
    fn test_profile_default_value() {
        let cli = Cli::try_parse_from(["samlsts", "auth"]).unwrap();
        assert_eq!(cli.profile, "default");
    }

    #[test]
    fn test_profile_custom_value() {
        let cli = Cli::try_parse_from(["samlsts", "--profile", "production", "auth"]).unwrap();
        assert_eq!(cli.profile, "production");
    }

    #[test]
    fn test_profile_short_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["samlsts", "env", "-p", "dev"]).unwrap();
        assert_eq!(cli.profile, "dev");
    }

    #[test]
    fn test_auth_with_role_parsing() {
        let cli = Cli::try_parse_from(["samlsts", "auth", "--role", "Developer"]).unwrap();
        match cli.command {
            Some(Commands::Auth(cmd)) => {
                assert_eq!(cmd.role, Some("Developer".to_string()));
            }
            _ => panic!("Expected Auth command"),
        }
    }

    #[test]
    fn test_auth_with_role_short_flag() {
        let cli = Cli::try_parse_from(["samlsts", "auth", "-r", "Admin"]).unwrap();
        match cli.command {
            Some(Commands::Auth(cmd)) => {
                assert_eq!(cmd.role, Some("Admin".to_string()));
            }
            _ => panic!("Expected Auth command"),
        }
    }

    #[test]
    fn test_list_command_parsing() {
        let cli = Cli::try_parse_from(["samlsts", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List(_))));
    }

    #[test]
    fn test_env_command_parsing() {
        let cli = Cli::try_parse_from(["samlsts", "env", "--shell", "posix"]).unwrap();
        match cli.command {
            Some(Commands::Env(cmd)) => assert_eq!(cmd.shell, Some(ShellFlavor::Posix)),
            _ => panic!("Expected Env command"),
        }
    }

    #[test]
    fn test_env_rejects_unknown_shell() {
        assert!(Cli::try_parse_from(["samlsts", "env", "--shell", "tcsh"]).is_err());
    }

    #[test]
    fn test_configure_command_parsing() {
        let cli = Cli::try_parse_from(["samlsts", "configure"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Configure(_))));
    }

    #[test]
    fn test_completions_command_parsing() {
        let cli = Cli::try_parse_from(["samlsts", "completions", "bash"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Completions(_))));
    }

    #[test]
    fn test_no_command_defaults_to_auth() {
        let cli = Cli::try_parse_from(["samlsts"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_command_structure_validation() {
        let cmd = Cli::command();
        cmd.debug_assert();
    }

    #[test]
    fn test_invalid_command_fails() {
        let result = Cli::try_parse_from(["samlsts", "web"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_flag_works() {
        let result = Cli::try_parse_from(["samlsts", "--help"]);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::DisplayHelp);
        }
    }

    #[test]
    fn test_version_flag_works() {
        let result = Cli::try_parse_from(["samlsts", "--version"]);
        assert!(result.is_err());
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn test_verbose_flag_multiple() {
        let cli = Cli::try_parse_from(["samlsts", "-vvv", "auth"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_verbose_long_flag() {
        let cli = Cli::try_parse_from(["samlsts", "--verbose", "--verbose", "list"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_verbose_default_zero() {
        let cli = Cli::try_parse_from(["samlsts", "auth"]).unwrap();
        assert_eq!(cli.verbose, 0);
    }
}

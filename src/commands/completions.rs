use anyhow::{Context, Result};
use clap::{Args, CommandFactory};
use clap_complete::Shell;
use std::io::{self, Write};

use crate::cli::Cli;

#[derive(Debug, Clone, Args)]
pub struct CompletionsCommand {
    #[arg(value_enum, help = "Target shell for completion script [default: from $SHELL]")]
    pub shell: Option<Shell>,
}

impl CompletionsCommand {
    pub fn execute(self) -> Result<()> {
        let shell = self
            .shell
            .or_else(Shell::from_env)
            .context("Could not detect the shell, pass one explicitly")?;
        write_completions(shell, &mut io::stdout())
            .context("Failed to write completion script")
    }
}

fn write_completions(shell: Shell, out: &mut dyn Write) -> io::Result<()> {
    let mut cmd = Cli::command();
    let app_name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, app_name, out);
    out.flush()
}

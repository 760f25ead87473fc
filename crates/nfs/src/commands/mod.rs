pub mod crp;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle CRP car archives
    Crp {
        #[command(subcommand)]
        command: crp::CrpCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Crp { command } => command.handle(),
        }
    }
}

use crate::{pkg::server::listen, prelude::Result};
use clap::{Parser, Subcommand};

mod watch;

#[derive(Parser)]
#[command(about = "verilearn marketplace and settlement services")]
struct Cmd {
    #[command(subcommand)]
    command: Option<SubCommandType>,
}

#[derive(Subcommand)]
enum SubCommandType {
    Listen {
        /// keep posts and profiles in process memory instead of the backend
        #[arg(long)]
        ephemeral: bool,
    },
    Watch {
        #[arg(value_enum)]
        event: watch::WatchedEvent,
    },
}

pub async fn run() -> Result<()> {
    let args = Cmd::parse();
    match args.command {
        Some(SubCommandType::Listen { ephemeral }) => {
            listen(ephemeral).await?;
        }
        Some(SubCommandType::Watch { event }) => {
            watch::follow(event).await?;
        }
        None => {
            tracing::error!("no subcommand passed");
        }
    }
    Ok(())
}

mod commands;
mod terminal;

use commands::{CommandLine, Commands, bindings, replay};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);
    print::banner(commands.quiet);

    let cfg = commands.config();

    match commands.command {
        Commands::Bindings => {
            print::header("production bindings", cfg.quiet);
            bindings::bindings(&cfg)
        }
        Commands::Replay { file } => {
            print::header("replaying script", cfg.quiet);
            replay::replay(&file, cfg, commands.limits).await
        }
    }
}

use clap::Parser;
use ream::{
    cli::{Cli, Commands},
    node,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Node(cmd) => {
            // Fall back to the verbosity flag if `RUST_LOG` is not set
            if std::env::var("RUST_LOG").is_err() {
                std::env::set_var("RUST_LOG", cmd.log_level());
            }

            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            if let Err(err) = node::run(cmd) {
                error!("Node failed: {err:#}");
                std::process::exit(1);
            }
        }
    }
}

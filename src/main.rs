mod cli;
mod config;
mod core;
mod error;
mod interrupt;
mod models;
mod progress;
mod sources;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    interrupt::install();

    if let Err(e) = cli::run(cli) {
        let interrupted = interrupt::requested()
            || matches!(e.downcast_ref::<error::Error>(), Some(error::Error::Interrupted));
        eprintln!("오류: {:#}", e);
        std::process::exit(if interrupted { 130 } else { 1 });
    }
}

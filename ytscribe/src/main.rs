use clap::Parser;

use ytscribe::cli::{init_logging, Cli};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    ytscribe::whisper_engine::quiet_native_logs();

    log::info!("Starting ytscribe {}", env!("CARGO_PKG_VERSION"));
    if let Err(e) = ytscribe::run(cli) {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

use chronos::console::{binfile, Console};
use chronos::debugger::platform;
use clap::Parser;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-platform native-code debugger", long_about = None)]
struct Args {
    /// Debug target file
    #[clap(short, long)]
    file: Option<PathBuf>,

    /// Enable verbose printing
    #[clap(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .init();

    info!("Chronos v{}", env!("CARGO_PKG_VERSION"));
    info!("Enter `help` in terminal for help");
    debug!("fpu present: {}", platform::is_fpu_present());

    if let Some(target) = args.file.as_deref() {
        if let Err(e) = binfile::validate_executable(target) {
            error!("{e:#}");
            exit(1);
        }
    }

    if let Err(e) = Console::new(args.file).run() {
        error!("{e:#}");
        exit(1);
    }
}

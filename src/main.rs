//! Thin CLI entry point; all real logic lives in the `mini` library (see
//! `src/lib.rs`, `src/driver.rs`). See `spec.md` §6.1.

use clap::Parser as _;

use mini::driver::{Cli, NullParser};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let code = mini::driver::run(&cli, &NullParser);
    std::process::exit(code);
}

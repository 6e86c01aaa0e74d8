use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Our crate logs at info (debug when verbose); dependencies only at warn unless RUST_LOG says
/// otherwise. Warnings and errors carry the module they came from.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME").cyan();
            let label = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Debug | Level::Trace => "DEBUG".dimmed(),
                Level::Info => return writeln!(buf, "[{}] {}", name, record.args()),
            };
            match record.level() {
                Level::Error | Level::Warn => writeln!(
                    buf,
                    "[{} {} {}] {}",
                    name,
                    label,
                    record.target().white(),
                    record.args()
                ),
                _ => writeln!(buf, "[{} {}] {}", name, label, record.args()),
            }
        })
        .try_init();
}

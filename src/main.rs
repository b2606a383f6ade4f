use crate::cli::run;

pub mod cli;
pub mod config;
pub mod domain;
pub mod http;
pub mod player;
pub mod storage;

fn main() {
    if let Err(e) = run() {
        log::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

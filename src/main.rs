use clap::Parser;
use scope_csv::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    match commands::run(args) {
        Ok(stats) if stats.errors_encountered == 0 => process::exit(0),
        Ok(_) => {
            // Unreadable files were already logged per file
            process::exit(2);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

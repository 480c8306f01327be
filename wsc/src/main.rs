mod commands;
mod logger;

use clap::Parser;
use colored::Colorize;
use commands::{Args, Decrypt, Encrypt};
use std::process;

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.verbose)?;

    if args.decrypt {
        Decrypt {
            input: args.input,
            output: args.output,
            keyfile: args.keyfile,
        }
        .execute()
    } else {
        Encrypt {
            input: args.input,
            output: args.output,
            keyfile: args.keyfile,
        }
        .execute()
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".bold().red(), e);
        process::exit(1);
    }
}

//! Print every entry of a corpus that matches a query, with the matches marked
//!
//! Run with: cargo run --example query -- "contains(text,'cat')" path/to/corpus
//!
//! Set RUST_LOG=corpusreader=debug to see what the reader is doing.

use corpusreader::{MarkerQuery, Reader, load_config};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} query corpus", args[0]);
        return ExitCode::FAILURE;
    }

    match run(&args[1], &args[2]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(query: &str, location: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let reader = Reader::open_with_config(location, &config)?;
    let markers = [MarkerQuery::new(query, "active", "1")];

    for name in reader.query(query)? {
        let name = name?;
        println!("{}", name);
        println!("{}", reader.read_marked(&name, &markers)?);
        println!();
    }
    Ok(())
}

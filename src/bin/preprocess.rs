//! Clean a raw Sentiment140 export into the labelled training corpus.
//!
//! Usage: cargo run --bin preprocess [raw_tweets.csv] [processed_tweets.csv]
//!
//! The raw file is the headerless six-column CSV
//! (sentiment, id, date, query, user, text) in Latin-1.

use std::path::Path;

use sentibot::corpus;

const DEFAULT_INPUT: &str = "data/raw_tweets.csv";
const DEFAULT_OUTPUT: &str = "data/processed_tweets.csv";

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 3 {
        eprintln!("Usage: {} [raw_tweets.csv] [processed_tweets.csv]", args[0]);
        eprintln!();
        eprintln!("Defaults: {DEFAULT_INPUT} -> {DEFAULT_OUTPUT}");
        std::process::exit(1);
    }

    let input = Path::new(args.get(1).map(String::as_str).unwrap_or(DEFAULT_INPUT));
    let output = Path::new(args.get(2).map(String::as_str).unwrap_or(DEFAULT_OUTPUT));

    if !input.exists() {
        eprintln!("Error: {:?} not found. Place the raw tweets there first.", input);
        std::process::exit(1);
    }

    println!("Cleaning tweets from {:?} (this may take a few minutes)...", input);
    match corpus::preprocess(input, output) {
        Ok(stats) => {
            println!("Rows read:              {}", stats.read);
            println!("Rows written:           {}", stats.written);
            println!("Skipped (other labels): {}", stats.skipped_label);
            println!("Skipped (empty text):   {}", stats.skipped_empty);
            println!("Cleaned data saved to {:?}", output);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

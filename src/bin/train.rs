//! Train the retrieval sentiment model from the processed corpus.
//!
//! Usage: cargo run --release --bin train [processed_tweets.csv] [sentiment_model.json]

use std::path::Path;
use std::time::Instant;

use sentibot::corpus;
use sentibot::sentiment::vectorizer::DEFAULT_MAX_FEATURES;
use sentibot::sentiment::{Classifier, SentimentModel, TrainOptions};

const DEFAULT_INPUT: &str = "data/processed_tweets.csv";
const DEFAULT_OUTPUT: &str = "data/sentiment_model.json";

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 3 {
        eprintln!("Usage: {} [processed_tweets.csv] [sentiment_model.json]", args[0]);
        eprintln!();
        eprintln!("Defaults: {DEFAULT_INPUT} -> {DEFAULT_OUTPUT}");
        std::process::exit(1);
    }

    let input = Path::new(args.get(1).map(String::as_str).unwrap_or(DEFAULT_INPUT));
    let output = Path::new(args.get(2).map(String::as_str).unwrap_or(DEFAULT_OUTPUT));

    if !input.exists() {
        eprintln!("Error: processed data not found at {:?}. Run preprocess first.", input);
        std::process::exit(1);
    }

    let samples = match corpus::read_processed(input) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if samples.is_empty() {
        eprintln!("Error: {:?} has no usable rows", input);
        std::process::exit(1);
    }
    println!("Loaded {} samples from {:?}", samples.len(), input);

    println!("Training (this may take a few minutes)...");
    let started = Instant::now();
    let model = SentimentModel::train(&samples, DEFAULT_MAX_FEATURES, TrainOptions::default());
    println!("Trained in {:.1?}", started.elapsed());

    let correct = samples
        .iter()
        .filter(|s| model.predict(&s.text) == s.sentiment)
        .count();
    println!(
        "Training accuracy: {:.2}%",
        100.0 * correct as f64 / samples.len() as f64
    );

    if let Err(e) = model.save(output) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    println!("Model saved to {:?}", output);
}

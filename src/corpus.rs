//! Offline corpus preparation: raw tweet CSV into cleaned, binary-labelled rows.
//!
//! Input is the headerless Sentiment140 layout
//! (`polarity,id,date,query,user,text`, Latin-1). Output is a `sentiment,text`
//! CSV with a header, where sentiment is `0` or `1`.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::normalize::normalize;
use crate::sentiment::Sentiment;

const TEXT_COLUMN: usize = 5;

/// One cleaned training example.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledText {
    pub sentiment: Sentiment,
    pub text: String,
}

/// Counters from a preprocessing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrepStats {
    pub read: usize,
    pub written: usize,
    /// Rows whose polarity is neither negative nor positive (e.g. neutral `2`).
    pub skipped_label: usize,
    /// Rows whose text was empty after cleaning.
    pub skipped_empty: usize,
}

#[derive(Debug)]
pub enum CorpusError {
    Io { path: PathBuf, source: std::io::Error },
    Csv { path: PathBuf, source: csv::Error },
    /// Row is missing the polarity or text column.
    MissingColumn { path: PathBuf, line: u64 },
}

impl fmt::Display for CorpusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "'{}': {}", path.display(), source),
            Self::Csv { path, source } => write!(f, "CSV error in '{}': {}", path.display(), source),
            Self::MissingColumn { path, line } => {
                write!(f, "'{}' line {}: missing column", path.display(), line)
            }
        }
    }
}

impl std::error::Error for CorpusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::MissingColumn { .. } => None,
        }
    }
}

/// Decode Latin-1 bytes. Every byte maps to the code point of the same value.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Map a raw polarity (`0`, `4`, or an already-binary `1`) to a label.
fn polarity(raw: &str) -> Option<Sentiment> {
    match raw.trim() {
        "0" => Some(Sentiment::Negative),
        "4" | "1" => Some(Sentiment::Positive),
        _ => None,
    }
}

/// Clean a raw corpus file and write the processed CSV.
pub fn preprocess(input: &Path, output: &Path) -> Result<PrepStats, CorpusError> {
    let csv_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: csv::Error| CorpusError::Csv { path, source: e }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .map_err(csv_err(input))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CorpusError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut writer = csv::Writer::from_path(output).map_err(csv_err(output))?;
    writer
        .write_record(["sentiment", "text"])
        .map_err(csv_err(output))?;

    let mut stats = PrepStats::default();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record).map_err(csv_err(input))? {
        stats.read += 1;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let (Some(raw_label), Some(raw_text)) = (record.get(0), record.get(TEXT_COLUMN)) else {
            return Err(CorpusError::MissingColumn { path: input.to_path_buf(), line });
        };

        let Some(sentiment) = polarity(&latin1(raw_label)) else {
            stats.skipped_label += 1;
            continue;
        };

        let text = normalize(latin1(raw_text));
        if text.is_empty() {
            stats.skipped_empty += 1;
            continue;
        }

        writer
            .write_record([sentiment.as_label().to_string(), text])
            .map_err(csv_err(output))?;
        stats.written += 1;

        if stats.read % 100_000 == 0 {
            debug!("Processed {} rows", stats.read);
        }
    }

    writer.flush().map_err(|e| CorpusError::Io {
        path: output.to_path_buf(),
        source: e,
    })?;

    info!(
        "Preprocessing complete: {} read, {} written, {} unlabelled, {} empty",
        stats.read, stats.written, stats.skipped_label, stats.skipped_empty
    );
    Ok(stats)
}

/// Load a processed `sentiment,text` CSV. Rows with empty text are skipped.
pub fn read_processed(path: &Path) -> Result<Vec<LabeledText>, CorpusError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| CorpusError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CorpusError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let (Some(label), Some(text)) = (record.get(0), record.get(1)) else {
            return Err(CorpusError::MissingColumn { path: path.to_path_buf(), line });
        };
        let Some(sentiment) = polarity(label) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        samples.push(LabeledText {
            sentiment,
            text: text.to_string(),
        });
    }

    info!("Loaded {} samples from {:?}", samples.len(), path);
    Ok(samples)
}

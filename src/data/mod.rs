//! # Datasets and batching
//!
//! Samples are read either from tab-separated files (`title\tcontent` per line) or from
//! spreadsheets holding annotated summaries, then tokenized and padded on the fly into batches.

mod generator;
mod loaders;

pub use generator::{sequence_padding, Batch, Batches, DataGenerator};
pub use loaders::{extract_summary, load_spreadsheet, load_tsv, Sample, Split};

//! # Tokenization for T5 PEGASUS
//!
//! The Chinese T5 PEGASUS checkpoints ship a BERT-style vocabulary extended with frequent words.
//! Text is first segmented with jieba (without HMM), words found in the vocabulary become single
//! tokens and everything else falls back to character-level WordPiece.

mod pegasus_tokenizer;
pub(crate) mod utils;

pub use pegasus_tokenizer::{PegasusTokenizer, END_TOKEN, PAD_TOKEN, START_TOKEN, UNKNOWN_TOKEN};

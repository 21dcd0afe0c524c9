// Copyright 2021 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::tokenizer::utils::{
    is_cjk_character, is_control, is_non_spacing_mark, is_punctuation, is_space, is_special,
    CJK_PUNCTUATION,
};
use crate::SummarizerError;
use jieba_rs::Jieba;
use lazy_static::lazy_static;
use regex::Regex;
use rust_tokenizers::vocab::{BertVocab, Vocab};
use std::collections::HashMap;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNKNOWN_TOKEN: &str = "[UNK]";
pub const START_TOKEN: &str = "[CLS]";
pub const END_TOKEN: &str = "[SEP]";

/// Words longer than this (in characters) are not split by WordPiece
const MAX_WORD_PIECE_LEN: usize = 200;

lazy_static! {
    static ref MULTIPLE_SPACES: Regex = Regex::new(" +").unwrap();
    static ref CONTRACTION: Regex = Regex::new("' (re|m|s|t|ve|d|ll) ").unwrap();
    static ref SPACE_AFTER_PUNCTUATION: Regex = {
        let alternatives = CJK_PUNCTUATION
            .chars()
            .chain("+-/={(<[".chars())
            .map(|ch| regex::escape(&ch.to_string()))
            .collect::<Vec<String>>()
            .join("|");
        Regex::new(&format!("({alternatives}) ")).unwrap()
    };
    static ref SPLIT_DECIMAL: Regex = Regex::new(r"(\d\.) (\d)").unwrap();
}

/// # Tokenizer for T5 PEGASUS models
///
/// WordPiece tokenizer over a BERT-style `vocab.txt`, with a jieba word segmentation pass in
/// front of it: words segmented by jieba that exist in the vocabulary are kept as a single token,
/// the remaining text goes through the usual BERT basic tokenization and greedy WordPiece.
pub struct PegasusTokenizer {
    token_to_id: HashMap<String, i64>,
    id_to_token: HashMap<i64, String>,
    lower_case: bool,
    jieba: Jieba,
    unknown_id: i64,
    pad_id: i64,
    start_id: i64,
    end_id: i64,
}

impl PegasusTokenizer {
    /// Create a new instance of a `PegasusTokenizer` from a `vocab.txt` file (one token per line).
    ///
    /// # Arguments
    ///
    /// * `path` - path to the vocabulary file
    /// * `lower_case` - lower-case and strip accents from the input text
    ///
    /// # Example
    ///
    /// ```no_run
    /// use t5_pegasus_summarizer::tokenizer::PegasusTokenizer;
    /// let tokenizer = PegasusTokenizer::from_file("chinese_t5_pegasus_small/vocab.txt", true).unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P, lower_case: bool) -> Result<Self, SummarizerError> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            SummarizerError::IOError(format!("invalid vocabulary path {}", path.display()))
        })?;
        let vocab = BertVocab::from_file(path_str)?;
        Self::from_values(vocab.values().clone(), lower_case)
    }

    /// Create a tokenizer from an ordered list of tokens, the position of each token being its id.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S], lower_case: bool) -> Result<Self, SummarizerError> {
        let values = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| (token.as_ref().to_string(), index as i64))
            .collect::<HashMap<String, i64>>();
        Self::from_values(values, lower_case)
    }

    fn from_values(token_to_id: HashMap<String, i64>, lower_case: bool) -> Result<Self, SummarizerError> {
        let special_id = |token: &str| {
            token_to_id.get(token).copied().ok_or_else(|| {
                SummarizerError::TokenizerError(format!(
                    "special token {token} missing from the vocabulary"
                ))
            })
        };
        let unknown_id = special_id(UNKNOWN_TOKEN)?;
        let pad_id = special_id(PAD_TOKEN)?;
        let start_id = special_id(START_TOKEN)?;
        let end_id = special_id(END_TOKEN)?;
        let id_to_token = token_to_id
            .iter()
            .map(|(token, id)| (*id, token.clone()))
            .collect();

        Ok(PegasusTokenizer {
            token_to_id,
            id_to_token,
            lower_case,
            jieba: Jieba::new(),
            unknown_id,
            pad_id,
            start_id,
            end_id,
        })
    }

    pub fn start_id(&self) -> i64 {
        self.start_id
    }

    pub fn end_id(&self) -> i64 {
        self.end_id
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    pub fn vocab_size(&self) -> usize {
        self.token_to_id.len()
    }

    fn normalize(&self, text: &str) -> String {
        if self.lower_case {
            text.to_lowercase()
                .nfd()
                .filter(|ch| !is_non_spacing_mark(*ch))
                .collect()
        } else {
            text.to_string()
        }
    }

    /// Splits text into tokens: jieba words found in the vocabulary are kept whole.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = self.normalize(text);
        let mut tokens = Vec::new();
        for word in self.jieba.cut(&text, false) {
            if self.token_to_id.contains_key(word) {
                tokens.push(word.to_string());
            } else {
                tokens.extend(self.basic_tokenize(word));
            }
        }
        tokens
    }

    /// Isolates CJK characters and punctuation, splits on whitespace and applies WordPiece.
    fn basic_tokenize(&self, text: &str) -> Vec<String> {
        let mut spaced = String::with_capacity(text.len());
        for ch in text.chars() {
            if is_punctuation(ch) || is_cjk_character(ch) {
                spaced.push(' ');
                spaced.push(ch);
                spaced.push(' ');
            } else if is_space(ch) {
                spaced.push(' ');
            } else if ch == '\0' || ch == '\u{fffd}' || is_control(ch) {
                continue;
            } else {
                spaced.push(ch);
            }
        }
        spaced
            .split_whitespace()
            .flat_map(|word| self.word_piece_tokenize(word))
            .collect()
    }

    /// Greedy longest-match-first WordPiece. A character that cannot be matched is emitted on its
    /// own and later mapped to the unknown token, as are words over `MAX_WORD_PIECE_LEN` characters.
    fn word_piece_tokenize(&self, word: &str) -> Vec<String> {
        if self.token_to_id.contains_key(word) {
            return vec![word.to_string()];
        }
        let chars = word.chars().collect::<Vec<char>>();
        if chars.len() > MAX_WORD_PIECE_LEN {
            return vec![word.to_string()];
        }
        let mut tokens = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut stop = chars.len();
            let mut sub_token = String::new();
            while stop > start {
                sub_token = chars[start..stop].iter().collect();
                if start > 0 {
                    sub_token = format!("##{sub_token}");
                }
                if self.token_to_id.contains_key(&sub_token) {
                    break;
                }
                stop -= 1;
            }
            if start == stop {
                stop += 1;
            }
            tokens.push(sub_token);
            start = stop;
        }
        tokens
    }

    pub fn convert_tokens_to_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<i64> {
        tokens
            .iter()
            .map(|token| {
                self.token_to_id
                    .get(token.as_ref())
                    .copied()
                    .unwrap_or(self.unknown_id)
            })
            .collect()
    }

    /// Encodes a text as `[CLS] tokens [SEP]`, dropping trailing content tokens so that the
    /// sequence does not exceed `max_len` (both markers are always kept).
    pub fn encode(&self, text: &str, max_len: usize) -> Vec<i64> {
        let mut tokens = self.tokenize(text);
        tokens.truncate(max_len.saturating_sub(2));
        let mut token_ids = Vec::with_capacity(tokens.len() + 2);
        token_ids.push(self.start_id);
        token_ids.extend(self.convert_tokens_to_ids(&tokens));
        token_ids.push(self.end_id);
        token_ids
    }

    /// Converts ids back to text, skipping special tokens. CJK characters are joined without
    /// separators, WordPiece continuations are merged and spaces around punctuation are cleaned.
    pub fn decode(&self, token_ids: &[i64]) -> String {
        let tokens = token_ids
            .iter()
            .filter_map(|id| self.id_to_token.get(id))
            .filter(|token| !is_special(token))
            .collect::<Vec<&String>>();

        let mut text = String::new();
        for (index, token) in tokens.iter().enumerate() {
            let mut chars = token.chars();
            let single_char = match (chars.next(), chars.next()) {
                (Some(ch), None) => Some(ch),
                _ => None,
            };
            if let Some(piece) = token.strip_prefix("##") {
                text.push_str(piece);
            } else if single_char.map_or(false, is_cjk_character) {
                text.push_str(token);
            } else if single_char.map_or(false, is_punctuation) {
                text.push_str(token);
                text.push(' ');
            } else if index > 0 && text.chars().last().map_or(false, is_cjk_character) {
                text.push_str(token);
            } else {
                text.push(' ');
                text.push_str(token);
            }
        }

        let text = MULTIPLE_SPACES.replace_all(&text, " ");
        let text = CONTRACTION.replace_all(&text, "'$1 ");
        let text = SPACE_AFTER_PUNCTUATION.replace_all(&text, "$1");
        let text = SPLIT_DECIMAL.replace_all(&text, "$1$2");
        text.trim().to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_tokenizer() -> PegasusTokenizer {
        let tokens = [
            "[PAD]", "[UNK]", "[CLS]", "[SEP]", "北京", "我", "爱", "天", "安", "门", "，", "。",
            "hello", "world", "un", "##aff", "##able", "1", ".", "5", "的", "'", "s",
        ];
        PegasusTokenizer::from_tokens(&tokens, true).unwrap()
    }

    #[test]
    fn keeps_segmented_words_in_vocabulary() {
        let tokenizer = test_tokenizer();
        assert_eq!(
            tokenizer.tokenize("我爱北京天安门"),
            vec!["我", "爱", "北京", "天", "安", "门"]
        );
    }

    #[test]
    fn applies_word_piece_to_latin_words() {
        let tokenizer = test_tokenizer();
        assert_eq!(tokenizer.tokenize("Unaffable"), vec!["un", "##aff", "##able"]);
        assert_eq!(tokenizer.tokenize("HELLO  World"), vec!["hello", "world"]);
    }

    #[test]
    fn unmatched_characters_map_to_unknown() {
        let tokenizer = test_tokenizer();
        let tokens = tokenizer.tokenize("卢");
        assert_eq!(tokens, vec!["卢"]);
        assert_eq!(tokenizer.convert_tokens_to_ids(&tokens), vec![1]);
    }

    #[test]
    fn encode_wraps_and_truncates() {
        let tokenizer = test_tokenizer();
        assert_eq!(tokenizer.encode("我爱北京", 16), vec![2, 5, 6, 4, 3]);
        assert_eq!(tokenizer.encode("我爱北京", 4), vec![2, 5, 6, 3]);
        assert_eq!(tokenizer.encode("我爱北京", 2), vec![2, 3]);
    }

    #[test]
    fn decode_joins_cjk_and_skips_special_tokens() {
        let tokenizer = test_tokenizer();
        assert_eq!(tokenizer.decode(&[2, 5, 6, 4, 10, 7, 11, 3, 0]), "我爱北京，天。");
    }

    #[test]
    fn decode_merges_latin_pieces() {
        let tokenizer = test_tokenizer();
        assert_eq!(tokenizer.decode(&[12, 13, 14, 15, 16]), "hello world unaffable");
        assert_eq!(tokenizer.decode(&[17, 18, 19]), "1.5");
    }

    #[test]
    fn symbols_stay_inside_words() {
        let tokenizer = PegasusTokenizer::from_tokens(
            &["[PAD]", "[UNK]", "[CLS]", "[SEP]", "10", "##～", "##20", "・", "a", "b"],
            true,
        )
        .unwrap();
        assert_eq!(tokenizer.basic_tokenize("10～20"), vec!["10", "##～", "##20"]);
        assert_eq!(tokenizer.basic_tokenize("a・b"), vec!["a", "・", "b"]);
        // jieba already separates non-alphanumeric characters
        assert_eq!(tokenizer.tokenize("10～20"), vec!["10", "～", "20"]);
    }

    #[test]
    fn overlong_words_are_kept_whole() {
        let tokenizer = test_tokenizer();
        let exact = "s".repeat(MAX_WORD_PIECE_LEN);
        assert_eq!(tokenizer.tokenize(&exact).len(), MAX_WORD_PIECE_LEN);

        for len in [MAX_WORD_PIECE_LEN + 1, 400, 800] {
            let word = "s".repeat(len);
            let tokens = tokenizer.tokenize(&word);
            assert_eq!(tokens, vec![word]);
            assert_eq!(tokenizer.convert_tokens_to_ids(&tokens), vec![1]);
        }
    }

    #[test]
    fn lower_casing_strips_accents() {
        let tokenizer = test_tokenizer();
        assert_eq!(tokenizer.tokenize("HÉLLO"), vec!["hello"]);
    }

    #[test]
    fn missing_special_tokens_are_reported() {
        let result = PegasusTokenizer::from_tokens(&["[PAD]", "[UNK]"], true);
        assert!(matches!(result, Err(SummarizerError::TokenizerError(_))));
    }
}

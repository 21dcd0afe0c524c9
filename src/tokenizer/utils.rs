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

//! Character classes used by the basic tokenization and detokenization steps.

use unicode_general_category::{get_general_category, GeneralCategory};

/// CJK punctuation glued to the preceding text when decoding
pub const CJK_PUNCTUATION: &str = "\u{ff02}\u{ff03}\u{ff04}\u{ff05}\u{ff06}\u{ff07}\u{ff08}\u{ff09}\u{ff0a}\u{ff0b}\u{ff0c}\u{ff0d}\u{ff0f}\u{ff1a}\u{ff1b}\u{ff1c}\u{ff1d}\u{ff1e}\u{ff20}\u{ff3b}\u{ff3c}\u{ff3d}\u{ff3e}\u{ff3f}\u{ff40}\u{ff5b}\u{ff5c}\u{ff5d}\u{ff5e}\u{ff5f}\u{ff60}\u{ff62}\u{ff63}\u{ff64}\u{3000}\u{3001}\u{3003}\u{3008}\u{3009}\u{300a}\u{300b}\u{300c}\u{300d}\u{300e}\u{300f}\u{3010}\u{3011}\u{3014}\u{3015}\u{3016}\u{3017}\u{3018}\u{3019}\u{301a}\u{301b}\u{301c}\u{301d}\u{301e}\u{301f}\u{3030}\u{303e}\u{303f}\u{2013}\u{2014}\u{2018}\u{2019}\u{201b}\u{201c}\u{201d}\u{201e}\u{201f}\u{2026}\u{2027}\u{fe4f}\u{fe51}\u{fe54}\u{00b7}\u{ff01}\u{ff1f}\u{ff61}\u{3002}";

pub fn is_cjk_character(ch: char) -> bool {
    matches!(ch as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0x20000..=0x2A6DF
        | 0x2A700..=0x2B73F
        | 0x2B740..=0x2B81F
        | 0x2B820..=0x2CEAF
        | 0xF900..=0xFAFF
        | 0x2F800..=0x2FA1F)
}

/// ASCII symbols plus every character of a Unicode punctuation category (`P*`).
pub fn is_punctuation(ch: char) -> bool {
    matches!(ch as u32, 33..=47 | 58..=64 | 91..=96 | 123..=126)
        || matches!(
            get_general_category(ch),
            GeneralCategory::ConnectorPunctuation
                | GeneralCategory::DashPunctuation
                | GeneralCategory::OpenPunctuation
                | GeneralCategory::ClosePunctuation
                | GeneralCategory::InitialPunctuation
                | GeneralCategory::FinalPunctuation
                | GeneralCategory::OtherPunctuation
        )
}

pub fn is_space(ch: char) -> bool {
    matches!(ch, ' ' | '\n' | '\r' | '\t')
        || get_general_category(ch) == GeneralCategory::SpaceSeparator
}

/// Control (`Cc`) and format (`Cf`) characters. Tab and line breaks are `Cc` too: callers test
/// `is_space` first.
pub fn is_control(ch: char) -> bool {
    matches!(
        get_general_category(ch),
        GeneralCategory::Control | GeneralCategory::Format
    )
}

/// Non-spacing marks (`Mn`), removed after NFD decomposition to strip accents
pub fn is_non_spacing_mark(ch: char) -> bool {
    get_general_category(ch) == GeneralCategory::NonspacingMark
}

/// Special tokens are written between square brackets in the vocabulary (`[CLS]`, `[SEP]`...)
pub fn is_special(token: &str) -> bool {
    token.len() > 1 && token.starts_with('[') && token.ends_with(']')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_characters() {
        assert!(is_cjk_character('中'));
        assert!(!is_cjk_character('a'));
        assert!(is_punctuation('，'));
        assert!(is_punctuation('。'));
        assert!(is_punctuation('!'));
        assert!(!is_punctuation('中'));
        assert!(!is_punctuation('\u{3000}'));
        assert!(is_space('\u{3000}'));
        assert!(is_control('\u{200B}'));
        assert!(is_control('\n'));
        assert!(is_space('\n'));
        assert!(!is_space('\u{000B}'));
        assert!(is_non_spacing_mark('\u{0301}'));
    }

    #[test]
    fn punctuation_follows_unicode_categories() {
        for ch in ['・', '⸺', '،', '।', '「', '—', '_'] {
            assert!(is_punctuation(ch), "{ch} is punctuation");
        }
        for ch in ['～', '＋', '＄', '｜', '＜', '＝', '＞', '＾', '¥', '×'] {
            assert!(!is_punctuation(ch), "{ch} is a symbol");
        }
    }

    #[test]
    fn detects_special_tokens() {
        assert!(is_special("[CLS]"));
        assert!(is_special("[unused1]"));
        assert!(!is_special("["));
        assert!(!is_special("北京"));
    }
}

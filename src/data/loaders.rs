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

use crate::SummarizerError;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const CONTENT_COLUMN: &str = "正文";
pub const SUMMARY_COLUMN: &str = "摘要";

lazy_static! {
    static ref SUMMARY_SPAN: Regex = Regex::new(r"beginbegin([\s\S]*?)endend").unwrap();
}

/// A (title, content) training pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Reference title / summary
    pub title: String,
    /// Source document
    pub content: String,
}

impl Sample {
    pub fn new<T: Into<String>, C: Into<String>>(title: T, content: C) -> Sample {
        Sample {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Partition of a spreadsheet: the first 80% of the rows are used for training, the remaining
/// 20% for both validation and testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    /// Row range `[start, end)` covered by the split for a sheet of `num_rows` data rows
    pub fn bounds(&self, num_rows: usize) -> (usize, usize) {
        let boundary = (num_rows as f64 * 0.8) as usize;
        match self {
            Split::Train => (0, boundary),
            Split::Valid | Split::Test => (boundary, num_rows),
        }
    }
}

/// Loads a tab-separated file with one `title\tcontent` pair per line.
///
/// Empty lines are skipped. Any other line that does not hold exactly two fields is reported as
/// a `DataError` pointing to its line number.
pub fn load_tsv<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, SummarizerError> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        if record.len() != 2 {
            return Err(SummarizerError::DataError(format!(
                "{}:{}: expected 2 tab-separated fields (title, content), found {}",
                path.display(),
                line,
                record.len()
            )));
        }
        samples.push(Sample::new(record[0].trim(), record[1].trim()));
    }
    info!(path = %path.display(), samples = samples.len(), "loaded tsv dataset");
    Ok(samples)
}

/// Concatenates all `beginbegin ... endend` spans of an annotated summary cell.
pub fn extract_summary(summary: &str) -> String {
    SUMMARY_SPAN
        .captures_iter(summary)
        .filter_map(|captures| captures.get(1))
        .map(|span| span.as_str())
        .collect()
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|ch| *ch != '\n' && *ch != ' ').collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(value) => value.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Loads the `split` partition of the first worksheet of a spreadsheet whose header row names a
/// `正文` (content) and a `摘要` (annotated summary) column.
pub fn load_spreadsheet<P: AsRef<Path>>(path: P, split: Split) -> Result<Vec<Sample>, SummarizerError> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range_at(0).ok_or_else(|| {
        SummarizerError::DataError(format!("{}: workbook has no worksheet", path.display()))
    })??;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| SummarizerError::DataError(format!("{}: empty worksheet", path.display())))?
        .iter()
        .map(cell_to_string)
        .collect::<Vec<String>>();
    let column_index = |name: &str| {
        header.iter().position(|cell| cell.trim() == name).ok_or_else(|| {
            SummarizerError::DataError(format!("{}: missing column {}", path.display(), name))
        })
    };
    let content_index = column_index(CONTENT_COLUMN)?;
    let summary_index = column_index(SUMMARY_COLUMN)?;

    let rows = rows.collect::<Vec<&[Data]>>();
    let (start, end) = split.bounds(rows.len());
    debug!(?split, start, end, "spreadsheet split bounds");

    let samples = rows[start..end]
        .iter()
        .map(|row| {
            let cell = |index: usize| row.get(index).map(cell_to_string).unwrap_or_default();
            let content = strip_whitespace(&cell(content_index));
            let title = strip_whitespace(&extract_summary(&cell(summary_index)));
            Sample { title, content }
        })
        .collect::<Vec<Sample>>();
    info!(path = %path.display(), ?split, samples = samples.len(), "loaded spreadsheet dataset");
    Ok(samples)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn extracts_all_summary_spans() {
        let summary = "前言beginbegin第一段endend中间\nbeginbegin第\n二段endend结尾";
        assert_eq!(extract_summary(summary), "第一段第\n二段");
        assert_eq!(extract_summary("no markers"), "");
    }

    #[test]
    fn split_bounds_follow_eighty_twenty() {
        assert_eq!(Split::Train.bounds(10), (0, 8));
        assert_eq!(Split::Valid.bounds(10), (8, 10));
        assert_eq!(Split::Test.bounds(7), (5, 7));
        assert_eq!(Split::Train.bounds(0), (0, 0));
    }

    #[test]
    fn loads_tsv_pairs() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "标题一\t正文一 内容")?;
        writeln!(file)?;
        writeln!(file, "标题二\t正文二  ")?;
        file.flush()?;

        let samples = load_tsv(file.path())?;

        assert_eq!(
            samples,
            vec![Sample::new("标题一", "正文一 内容"), Sample::new("标题二", "正文二")]
        );
        Ok(())
    }

    #[test]
    fn rejects_malformed_tsv_line() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "标题一\t正文一")?;
        writeln!(file, "只有一列")?;
        file.flush()?;

        let error = load_tsv(file.path()).unwrap_err();

        match error {
            SummarizerError::DataError(message) => assert!(message.contains(":2:")),
            other => panic!("unexpected error {other:?}"),
        }
        Ok(())
    }

    fn write_workbook(path: &Path, header: &[&str], rows: usize) -> anyhow::Result<()> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            worksheet.write_string(0, col as u16, *name)?;
        }
        for row in 1..=rows {
            for (col, name) in header.iter().enumerate() {
                let value = match *name {
                    CONTENT_COLUMN => format!("第{row}篇 正文\n内容 "),
                    SUMMARY_COLUMN => {
                        format!("开头beginbegin标题 {row}endend中间beginbegin补充endend结尾")
                    }
                    _ => row.to_string(),
                };
                worksheet.write_string(row as u32, col as u16, value)?;
            }
        }
        workbook.save(path)?;
        Ok(())
    }

    #[test]
    fn loads_spreadsheet_splits() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.xlsx");
        write_workbook(&path, &["编号", SUMMARY_COLUMN, CONTENT_COLUMN], 5)?;

        let train = load_spreadsheet(&path, Split::Train)?;
        let valid = load_spreadsheet(&path, Split::Valid)?;
        let test = load_spreadsheet(&path, Split::Test)?;

        assert_eq!(train.len(), 4);
        assert_eq!(train[0], Sample::new("标题1补充", "第1篇正文内容"));
        assert_eq!(train[3], Sample::new("标题4补充", "第4篇正文内容"));
        assert_eq!(valid, vec![Sample::new("标题5补充", "第5篇正文内容")]);
        assert_eq!(test, valid);
        Ok(())
    }

    #[test]
    fn rejects_spreadsheet_without_summary_column() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.xlsx");
        write_workbook(&path, &["编号", CONTENT_COLUMN], 2)?;

        match load_spreadsheet(&path, Split::Train).unwrap_err() {
            SummarizerError::DataError(message) => assert!(message.contains(SUMMARY_COLUMN)),
            other => panic!("unexpected error {other:?}"),
        }
        Ok(())
    }
}

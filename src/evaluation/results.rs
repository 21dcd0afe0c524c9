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
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::info;

const HEADER: [&str; 3] = ["content", "title", "pred_title"];

/// Source document, reference title and generated title, the titles being spaced per character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub content: String,
    pub title: String,
    pub pred_title: String,
}

/// Append-only collection of generated titles.
#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    rows: Vec<ResultRow>,
}

impl ResultsTable {
    pub fn new() -> ResultsTable {
        ResultsTable::default()
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a header line followed by all rows to the file at `path` as comma-separated
    /// values with `\r\n` line endings. The file and its parent directory are created if needed;
    /// existing content is kept.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), SummarizerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.write_record([&row.content, &row.title, &row.pred_title])?;
        }
        writer.flush()?;
        info!(rows = self.rows.len(), path = %path.display(), "results written");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(content: &str, title: &str, pred_title: &str) -> ResultRow {
        ResultRow {
            content: content.to_string(),
            title: title.to_string(),
            pred_title: pred_title.to_string(),
        }
    }

    #[test]
    fn writes_header_and_rows() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("results").join("results.tsv");
        let mut table = ResultsTable::new();
        table.push(row("北京今天下雨", "北 京 下 雨", "北 京 雨"));
        table.push(row("a, b", "a", ""));
        table.write(&path)?;

        let written = fs::read_to_string(&path)?;
        assert_eq!(
            written,
            "content,title,pred_title\r\n北京今天下雨,北 京 下 雨,北 京 雨\r\n\"a, b\",a,\r\n"
        );
        Ok(())
    }

    #[test]
    fn appends_to_existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("results.tsv");
        let mut table = ResultsTable::new();
        table.push(row("c", "t", "p"));
        table.write(&path)?;
        table.write(&path)?;

        let written = fs::read_to_string(&path)?;
        assert_eq!(written.lines().count(), 4);
        assert_eq!(written.matches("content,title,pred_title").count(), 2);
        Ok(())
    }
}

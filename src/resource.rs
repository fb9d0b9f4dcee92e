//! Reading and writing the game's string tables
//!
//! The tables are UTF-16LE text files with one tab-separated entry per line:
//!
//! ```text
//! 电力\t0\t1001\tPower
//! ```
//!
//! A line with at least four columns and a non-blank fourth column is
//! translatable: the first column (the source-language original) is both the
//! key and the context handed to the model, the fourth column is the text.
//! Every other line is carried through untouched.

use crate::error::{Error, Result};
use crate::record::{OutputRecord, SourceRecord};
use encoding_rs::UTF_16LE;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Files shipped by the game, in the order they are processed
pub const DEFAULT_FILES: &[&str] = &[
    "[outsource].txt",
    "[user].txt",
    "base.txt",
    "combat.txt",
    "creation.txt",
    "dictionary.txt",
    "keys.txt",
    "parameters.txt",
    "prototype.txt",
];

const TEXT_COLUMN: usize = 3;
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Passthrough(String),
    Entry {
        key: String,
        columns: Vec<String>,
        ending: String,
    },
}

/// A parsed string table that can be written back with new texts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    lines: Vec<Line>,
    has_bom: bool,
}

impl ResourceFile {
    /// Parse already-decoded text
    ///
    /// Repeated keys get `#2`, `#3`, … suffixes, skipping any suffixed form
    /// that already appears literally in the first column.
    pub fn parse(content: &str) -> Self {
        let raw_lines: Vec<(&str, &str, Vec<&str>)> = content
            .split_inclusive('\n')
            .map(|raw| {
                let (body, ending) = split_line_ending(raw);
                (raw, ending, body.split('\t').collect())
            })
            .collect();

        let literal: HashSet<&str> = raw_lines
            .iter()
            .filter(|(_, _, columns)| is_entry(columns))
            .map(|(_, _, columns)| columns[0])
            .collect();

        let mut used: HashSet<String> = HashSet::new();
        let mut next_suffix: HashMap<&str, usize> = HashMap::new();
        let lines = raw_lines
            .into_iter()
            .map(|(raw, ending, columns)| {
                if !is_entry(&columns) {
                    return Line::Passthrough(raw.to_string());
                }

                let base = columns[0];
                let key = if used.contains(base) {
                    let n = next_suffix.entry(base).or_insert(2);
                    loop {
                        let candidate = format!("{}#{}", base, n);
                        *n += 1;
                        if !literal.contains(candidate.as_str()) && !used.contains(&candidate) {
                            break candidate;
                        }
                    }
                } else {
                    base.to_string()
                };
                used.insert(key.clone());

                Line::Entry {
                    key,
                    columns: columns.into_iter().map(str::to_string).collect(),
                    ending: ending.to_string(),
                }
            })
            .collect();

        Self {
            lines,
            has_bom: false,
        }
    }

    /// Decode UTF-16LE bytes (an optional BOM is tolerated and preserved)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let has_bom = bytes.starts_with(&UTF16LE_BOM);
        let (text, had_errors) = UTF_16LE.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(Error::Resource(
                "invalid UTF-16LE sequence in string table".to_string(),
            ));
        }
        let mut file = Self::parse(&text);
        file.has_bom = has_bom;
        Ok(file)
    }

    /// Read and decode a string table from disk
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::decode(&bytes).map_err(|e| match e {
            Error::Resource(msg) => Error::Resource(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Translatable records in file order
    pub fn records(&self) -> Vec<SourceRecord> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(order, line)| match line {
                Line::Entry { key, columns, .. } => {
                    let record = SourceRecord::new(key.clone(), columns[TEXT_COLUMN].clone(), order);
                    let context = columns[0].trim();
                    Some(if context.is_empty() {
                        record
                    } else {
                        record.with_context(context)
                    })
                }
                Line::Passthrough(_) => None,
            })
            .collect()
    }

    /// Render the table with the text column replaced from `outputs`
    ///
    /// Entries without an output keep their original text.
    pub fn render(&self, outputs: &[OutputRecord]) -> String {
        let by_key: HashMap<&str, &str> = outputs
            .iter()
            .map(|o| (o.key.as_str(), o.text.as_str()))
            .collect();

        let mut rendered = String::new();
        for line in &self.lines {
            match line {
                Line::Passthrough(raw) => rendered.push_str(raw),
                Line::Entry {
                    key,
                    columns,
                    ending,
                } => {
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            rendered.push('\t');
                        }
                        if i == TEXT_COLUMN {
                            rendered.push_str(by_key.get(key.as_str()).copied().unwrap_or(column));
                        } else {
                            rendered.push_str(column);
                        }
                    }
                    rendered.push_str(ending);
                }
            }
        }
        rendered
    }

    /// Encode the rendered table as UTF-16LE
    pub fn encode(&self, outputs: &[OutputRecord]) -> Vec<u8> {
        let rendered = self.render(outputs);
        let mut bytes = Vec::with_capacity(rendered.len() * 2 + 2);
        if self.has_bom {
            bytes.extend_from_slice(&UTF16LE_BOM);
        }
        for unit in rendered.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes
    }

    /// Write the translated table, creating parent directories
    pub fn write(&self, path: &Path, outputs: &[OutputRecord]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(path, self.encode(outputs)).map_err(|e| Error::io(path, e))
    }
}

fn is_entry(columns: &[&str]) -> bool {
    columns.len() > TEXT_COLUMN && !columns[TEXT_COLUMN].trim().is_empty()
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = raw.strip_suffix('\n') {
        (body, "\n")
    } else {
        (raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "电力\t0\t1001\tPower\r\n# comment line\r\n力量\t0\t1002\tStrength\r\n空\t0\t1003\t   \r\n短\t0\r\n电力\t0\t1004\t  Power  ";

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_records_are_translatable_lines_only() {
        let file = ResourceFile::parse(SAMPLE);
        let records = file.records();

        let keys: Vec<_> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["电力", "力量", "电力#2"]);
        assert_eq!(records[0].text, "Power");
        assert_eq!(records[0].context.as_deref(), Some("电力"));
        assert_eq!(records[2].text, "  Power  ");
    }

    #[test]
    fn test_duplicate_suffix_never_collides_with_literal_key() {
        let file = ResourceFile::parse("a\t0\t1\tPower\na#2\t0\t2\tStrength\na\t0\t3\tElectricity\na\t0\t4\tIron\n");
        let keys: Vec<_> = file.records().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a", "a#2", "a#3", "a#4"]);

        let outputs = vec![
            OutputRecord {
                key: "a#2".to_string(),
                text: "Forza".to_string(),
                order: 1,
            },
            OutputRecord {
                key: "a#3".to_string(),
                text: "Elettricità".to_string(),
                order: 2,
            },
        ];
        let rendered = file.render(&outputs);
        let texts: Vec<_> = rendered
            .lines()
            .map(|l| l.split('\t').nth(3).unwrap())
            .collect();
        assert_eq!(texts, vec!["Power", "Forza", "Elettricità", "Iron"]);
    }

    #[test]
    fn test_order_is_line_position() {
        let records = ResourceFile::parse(SAMPLE).records();
        let orders: Vec<_> = records.iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![0, 2, 5]);
    }

    #[test]
    fn test_render_without_outputs_is_identity() {
        let file = ResourceFile::parse(SAMPLE);
        assert_eq!(file.render(&[]), SAMPLE);
    }

    #[test]
    fn test_render_replaces_only_text_column() {
        let file = ResourceFile::parse(SAMPLE);
        let outputs = vec![
            OutputRecord {
                key: "电力".to_string(),
                text: "Energia".to_string(),
                order: 0,
            },
            OutputRecord {
                key: "力量".to_string(),
                text: "Forza".to_string(),
                order: 2,
            },
        ];
        let rendered = file.render(&outputs);
        let lines: Vec<_> = rendered.split("\r\n").collect();

        assert_eq!(lines[0], "电力\t0\t1001\tEnergia");
        assert_eq!(lines[1], "# comment line");
        assert_eq!(lines[2], "力量\t0\t1002\tForza");
        assert_eq!(lines[5], "电力\t0\t1004\t  Power  ");
    }

    #[test]
    fn test_decode_encode_utf16le() {
        let bytes = utf16le(SAMPLE);
        let file = ResourceFile::decode(&bytes).unwrap();
        assert_eq!(file.records().len(), 3);
        assert_eq!(file.encode(&[]), bytes);
    }

    #[test]
    fn test_bom_is_preserved() {
        let mut bytes = UTF16LE_BOM.to_vec();
        bytes.extend(utf16le("键\ta\tb\tText\n"));
        let file = ResourceFile::decode(&bytes).unwrap();

        assert_eq!(file.records()[0].key, "键");
        assert_eq!(file.encode(&[]), bytes);
    }

    #[test]
    fn test_invalid_utf16_is_an_error() {
        // Unpaired high surrogate
        let bytes = vec![0x00, 0xD8, 0x41, 0x00];
        assert!(matches!(
            ResourceFile::decode(&bytes),
            Err(Error::Resource(_))
        ));
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("translated").join("it").join("base.txt");
        let file = ResourceFile::parse("k\t0\t1\tHello\n");

        file.write(&path, &[]).unwrap();
        let back = ResourceFile::read(&path).unwrap();
        assert_eq!(back.records()[0].text, "Hello");
    }
}

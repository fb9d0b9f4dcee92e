//! Greedy batching of lines for translation requests
//!
//! Records are packed in input order. A batch is closed as soon as the next
//! record would push it past either the line or the character limit. A record
//! that alone exceeds the character limit still gets a batch of its own.

use crate::record::SourceRecord;

/// Size limits for a single translation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_lines: usize,
    pub max_chars: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_lines: 20,
            max_chars: 4000,
        }
    }
}

/// One translation request's worth of records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Position of this batch within its file
    pub index: usize,
    pub records: Vec<SourceRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.records.iter().map(SourceRecord::char_len).sum()
    }
}

/// Pack `records` into batches under `limits`
pub fn make_batches(records: Vec<SourceRecord>, limits: BatchLimits) -> Vec<Batch> {
    let max_lines = limits.max_lines.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<SourceRecord> = Vec::new();
    let mut current_chars = 0usize;

    for record in records {
        let len = record.char_len();
        let over_chars = current_chars + len > limits.max_chars;
        let over_lines = current.len() >= max_lines;

        if !current.is_empty() && (over_chars || over_lines) {
            batches.push(Batch {
                index: batches.len(),
                records: std::mem::take(&mut current),
            });
            current_chars = 0;
        }

        current_chars += len;
        current.push(record);
    }

    if !current.is_empty() {
        batches.push(Batch {
            index: batches.len(),
            records: current,
        });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(texts: &[&str]) -> Vec<SourceRecord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SourceRecord::new(format!("k{}", i), *t, i))
            .collect()
    }

    fn flatten(batches: &[Batch]) -> Vec<SourceRecord> {
        batches.iter().flat_map(|b| b.records.clone()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(make_batches(Vec::new(), BatchLimits::default()).is_empty());
    }

    #[test]
    fn test_small_input_is_one_batch() {
        let batches = make_batches(records(&["Power", "Strength"]), BatchLimits::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0].index, 0);
    }

    #[test]
    fn test_line_limit() {
        let limits = BatchLimits {
            max_lines: 2,
            max_chars: 1000,
        };
        let batches = make_batches(records(&["a", "b", "c", "d", "e"]), limits);

        let sizes: Vec<_> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let indices: Vec<_> = batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_char_limit() {
        let limits = BatchLimits {
            max_lines: 100,
            max_chars: 10,
        };
        let batches = make_batches(records(&["12345", "12345", "1"]), limits);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].char_count(), 10);
        assert_eq!(batches[1].char_count(), 1);
    }

    #[test]
    fn test_oversized_record_gets_singleton_batch() {
        let limits = BatchLimits {
            max_lines: 100,
            max_chars: 10,
        };
        let long = "x".repeat(25);
        let batches = make_batches(records(&["ab", long.as_str(), "cd"]), limits);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].records[0].text, long);
    }

    #[test]
    fn test_chars_are_counted_not_bytes() {
        let limits = BatchLimits {
            max_lines: 100,
            max_chars: 6,
        };
        // 3 chars each, 9 bytes each
        let batches = make_batches(records(&["戴森球", "戴森球"]), limits);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_packing_invariants() {
        let limits = BatchLimits {
            max_lines: 3,
            max_chars: 12,
        };
        let long = "y".repeat(30);
        let input = records(&[
            "alpha", "beta", "gamma", long.as_str(), "delta", "e", "f", "g", "h", "epsilon",
        ]);
        let batches = make_batches(input.clone(), limits);

        for batch in &batches {
            assert!(batch.len() <= limits.max_lines);
            assert!(batch.char_count() <= limits.max_chars || batch.len() == 1);
        }
        assert_eq!(flatten(&batches), input);
    }
}

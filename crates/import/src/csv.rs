use std::io::Read;
use thiserror::Error;

/// Columns every input file must carry. `category` and `transaction_type`
/// are required for shape compatibility but their values are recomputed.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "date",
    "description",
    "category",
    "transaction_type",
    "amount",
];

/// One input row. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawRecord {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    /// Every other cell, in the order of [`RawBatch::passthrough_columns`].
    pub passthrough: Vec<Option<String>>,
}

/// The header and rows of a single source file.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub columns: Vec<String>,
    pub passthrough_columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Required columns absent from the header, in required-column order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: expected at most {expected} fields, found {found}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Column positions of the named fields; everything else is passthrough.
struct ColumnLayout {
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    passthrough: Vec<usize>,
}

impl ColumnLayout {
    fn from_headers(columns: &[String]) -> Self {
        let find = |name: &str| columns.iter().position(|c| c == name);
        let date = find("date");
        let description = find("description");
        let amount = find("amount");
        let passthrough = (0..columns.len())
            .filter(|i| Some(*i) != date && Some(*i) != description && Some(*i) != amount)
            .collect();
        Self {
            date,
            description,
            amount,
            passthrough,
        }
    }
}

fn cell(record: &csv::StringRecord, col: Option<usize>) -> Option<String> {
    col.and_then(|c| record.get(c))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Read a headered CSV into a [`RawBatch`].
///
/// Short rows are padded with empty cells; rows longer than the header are
/// rejected because their cells cannot be attributed to a column.
pub fn read_batch<R: Read>(data: R) -> Result<RawBatch, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let columns: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    let layout = ColumnLayout::from_headers(&columns);

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;

        if record.len() > columns.len() {
            return Err(LoadError::TooManyFields {
                line: record.position().map_or(0, |p| p.line()),
                expected: columns.len(),
                found: record.len(),
            });
        }

        records.push(RawRecord {
            date: cell(&record, layout.date),
            description: cell(&record, layout.description),
            amount: cell(&record, layout.amount),
            passthrough: layout
                .passthrough
                .iter()
                .map(|&c| cell(&record, Some(c)))
                .collect(),
        });
    }

    let passthrough_columns = layout
        .passthrough
        .iter()
        .map(|&c| columns[c].clone())
        .collect();

    Ok(RawBatch {
        columns,
        passthrough_columns,
        records,
    })
}

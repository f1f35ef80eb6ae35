use super::schema::{Field, FIELD_COUNT};
use super::CleaningError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 100_000;

// Upper bound on the up-front allocation for a batch; large batch sizes grow on demand.
const PREALLOCATED_ROWS: usize = 8_192;

/// Raw trimmed cells of one input row, aligned to [`Field`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    cells: [Option<String>; FIELD_COUNT],
}

impl RawRecord {
    #[cfg(test)]
    pub(crate) fn cell(&self, field: Field) -> Option<&str> {
        self.cells[field.index()].as_deref()
    }

    pub fn with(mut self, field: Field, value: &str) -> Self {
        self.cells[field.index()] = Some(value.to_string());
        self
    }

    pub(crate) fn take(&mut self, field: Field) -> Option<String> {
        self.cells[field.index()].take()
    }
}

/// Forward-only reader yielding fixed-size batches of rows from a delimited file.
pub struct BatchReader<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<Option<Field>>,
    batch_size: usize,
    input: String,
    row: csv::StringRecord,
    finished: bool,
}

impl BatchReader<File> {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, CleaningError> {
        let input = path.display().to_string();
        let file = File::open(path).map_err(|err| CleaningError::Parse {
            input: input.clone(),
            source: csv::Error::from(err),
        })?;
        Self::from_reader(file, batch_size, input)
    }
}

impl<R: Read> BatchReader<R> {
    pub fn from_reader(
        reader: R,
        batch_size: usize,
        input: impl Into<String>,
    ) -> Result<Self, CleaningError> {
        if batch_size == 0 {
            return Err(CleaningError::InvalidBatchSize);
        }

        let input = input.into();
        // short rows are padded with missing cells; long rows are rejected per row
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|source| CleaningError::Parse {
                input: input.clone(),
                source,
            })?
            .clone();
        let columns = map_columns(&headers)?;

        Ok(Self {
            reader,
            columns,
            batch_size,
            input,
            row: csv::StringRecord::new(),
            finished: false,
        })
    }

    /// Recognised fields in header order; unrecognised and repeated columns map to `None`.
    #[cfg(test)]
    pub(crate) fn columns(&self) -> &[Option<Field>] {
        &self.columns
    }

    fn read_batch(&mut self) -> Result<Vec<RawRecord>, CleaningError> {
        let mut batch = Vec::with_capacity(self.batch_size.min(PREALLOCATED_ROWS));

        while batch.len() < self.batch_size {
            let has_row = self
                .reader
                .read_record(&mut self.row)
                .map_err(|source| CleaningError::Parse {
                    input: self.input.clone(),
                    source,
                })?;
            if !has_row {
                self.finished = true;
                break;
            }
            if self.row.len() > self.columns.len() {
                return Err(CleaningError::RowTooLong {
                    input: self.input.clone(),
                    line: self.row.position().map_or(0, |position| position.line()),
                    found: self.row.len(),
                    expected: self.columns.len(),
                });
            }
            batch.push(self.raw_record());
        }

        Ok(batch)
    }

    fn raw_record(&self) -> RawRecord {
        let mut record = RawRecord::default();
        for (cell, column) in self.row.iter().zip(&self.columns) {
            if let Some(field) = column {
                if !cell.is_empty() {
                    record.cells[field.index()] = Some(cell.to_string());
                }
            }
        }
        record
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = Result<Vec<RawRecord>, CleaningError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_batch() {
            Ok(batch) if batch.is_empty() => None,
            Ok(batch) => Some(Ok(batch)),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

fn map_columns(headers: &csv::StringRecord) -> Result<Vec<Option<Field>>, CleaningError> {
    let mut seen = [false; FIELD_COUNT];
    let columns: Vec<Option<Field>> = headers
        .iter()
        .map(|name| {
            Field::from_column(name)
                .filter(|field| !std::mem::replace(&mut seen[field.index()], true))
        })
        .collect();

    let missing: Vec<&'static str> = Field::ordered()
        .into_iter()
        .filter(|field| field.is_required() && !seen[field.index()])
        .map(Field::column)
        .collect();

    if missing.is_empty() {
        Ok(columns)
    } else {
        Err(CleaningError::Schema { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "Code,Code Type,Negotiated Price,Negotiated Percentage,Gross Charge,\
Discounted Cash Price,Min Price,Max Price,Estimated Amount,Insurance Payer Name,\
Insurance Plan Name,Negotiated Methodology,Negotiated Algorithm,Description,\
Additional Notes,Drug Unit,Drug Type,Billing Class";

    fn input_with_rows(rows: usize) -> String {
        let mut csv = format!("{HEADER}\n");
        for index in 0..rows {
            csv.push_str(&format!("{index:05},CPT,100,,,,,,,,,,,visit {index},,,,facility\n"));
        }
        csv
    }

    #[test]
    fn yields_fixed_size_batches_until_exhausted() {
        let reader = BatchReader::from_reader(Cursor::new(input_with_rows(5)), 2, "memory")
            .expect("header accepted");
        let sizes: Vec<usize> = reader
            .map(|batch| batch.expect("batch reads").len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn exact_multiple_of_batch_size_has_no_trailing_empty_batch() {
        let reader = BatchReader::from_reader(Cursor::new(input_with_rows(4)), 2, "memory")
            .expect("header accepted");
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn cells_are_trimmed_and_empty_cells_are_missing() {
        let csv = format!("{HEADER}\n  99213 , cpt ,$150.00,,,,,,,,,,,,,,,\n");
        let mut reader =
            BatchReader::from_reader(Cursor::new(csv), 10, "memory").expect("header accepted");
        let batch = reader.next().expect("one batch").expect("batch reads");
        let row = &batch[0];
        assert_eq!(row.cell(Field::Code), Some("99213"));
        assert_eq!(row.cell(Field::CodeType), Some("cpt"));
        assert_eq!(row.cell(Field::NegotiatedPrice), Some("$150.00"));
        assert_eq!(row.cell(Field::Description), None);
        assert_eq!(row.cell(Field::Modifiers), None);
    }

    #[test]
    fn extra_columns_are_ignored_and_optional_columns_may_be_absent() {
        let reader = BatchReader::from_reader(Cursor::new(input_with_rows(1)), 10, "memory")
            .expect("header accepted");
        let columns = reader.columns();
        assert_eq!(columns.first(), Some(&Some(Field::Code)));
        assert_eq!(columns.last(), Some(&None));
        assert!(!columns.contains(&Some(Field::Setting)));
    }

    #[test]
    fn missing_required_columns_is_a_schema_error() {
        let csv = "code,description\n99213,office visit\n";
        let error = BatchReader::from_reader(Cursor::new(csv), 10, "memory")
            .err()
            .expect("schema error");
        match error {
            CleaningError::Schema { missing } => {
                assert!(missing.contains(&"code type"));
                assert!(missing.contains(&"drug type"));
                assert!(!missing.contains(&"code"));
                assert!(!missing.contains(&"setting"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn short_rows_read_their_absent_trailing_cells_as_missing() {
        let csv = format!("{HEADER}\n99213,CPT,150,,,,,,,,,,,office visit\n99214,CPT\n");
        let mut reader =
            BatchReader::from_reader(Cursor::new(csv), 10, "memory").expect("header accepted");
        let batch = reader.next().expect("one batch").expect("short rows are tolerated");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].cell(Field::Description), Some("office visit"));
        assert_eq!(batch[0].cell(Field::DrugType), None);
        assert_eq!(batch[1].cell(Field::Code), Some("99214"));
        assert_eq!(batch[1].cell(Field::NegotiatedPrice), None);
        assert!(reader.next().is_none());
    }

    #[test]
    fn rows_longer_than_the_header_are_rejected() {
        let csv = format!("{HEADER}\n99213,CPT,,,,,,,,,,,,,,,,,surplus\n");
        let mut reader =
            BatchReader::from_reader(Cursor::new(csv), 10, "memory").expect("header accepted");
        match reader.next() {
            Some(Err(CleaningError::RowTooLong {
                input,
                line,
                found,
                expected,
            })) => {
                assert_eq!(input, "memory");
                assert_eq!(line, 2);
                assert_eq!(found, 19);
                assert_eq!(expected, 18);
            }
            other => panic!("expected row length error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let error = BatchReader::from_reader(Cursor::new(input_with_rows(1)), 0, "memory")
            .err()
            .expect("batch size rejected");
        assert!(matches!(error, CleaningError::InvalidBatchSize));
    }

    #[test]
    fn open_reports_missing_files_as_parse_errors() {
        let error = BatchReader::open(Path::new("./does-not-exist.csv"), 10)
            .err()
            .expect("missing file");
        assert!(matches!(error, CleaningError::Parse { .. }));
    }
}

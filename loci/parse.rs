// ========================================================================================
//
//                         Variant table header & row parsing
//
// ========================================================================================
//
// GATK `VariantsToTable` output is whitespace delimited. Columns 0 and 1 are the
// chromosome and position. A within-sample table carries the site depth in column 3.
// An across-sample table carries genotype/depth pairs from column 4 onwards, one pair
// per sample, and its header names each sample on the genotype column.

use crate::types::{Depth, Genotype, MISSING_DEPTH, MISSING_GENOTYPE, Row, SampleCall};
use thiserror::Error;

/// Token that opens the header line of every GATK table.
pub const HEADER_TOKEN: &str = "CHROM";

/// Index of the first genotype column in an across-sample table.
pub const FIRST_SAMPLE_COLUMN: usize = 4;

/// Minimum number of columns in either table layout.
pub const MIN_COLUMNS: usize = 4;

const CHROM_COLUMN: usize = 0;
const POS_COLUMN: usize = 1;
const WITHIN_DEPTH_COLUMN: usize = 3;

/// Suffixes the upstream merge step appends to genotype column names.
const MERGE_SUFFIXES: [&str; 3] = ["_unmerged.GT", "_merged.GT", ".GT"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected at least {expected} fields but found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: column {column} ({name}) is not a valid integer: '{value}'")]
    InvalidInteger {
        line: usize,
        column: usize,
        name: &'static str,
        value: String,
    },
    #[error("line {line}: data row found before the CHROM header line")]
    MissingHeader { line: usize },
    #[error("table has no CHROM header line")]
    NoHeader,
    #[error("line {line}: malformed header: {message}")]
    MalformedHeader { line: usize, message: String },
    #[error("line {line}: line is not valid UTF-8")]
    NotUtf8 { line: usize },
}

/// The two table layouts the segmenter understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableLayout {
    WithinSample,
    AcrossSample,
}

/// Column information taken from a header line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableHeader {
    pub columns: usize,
    pub sample_names: Vec<String>,
}

pub fn is_header(line: &str) -> bool {
    line.starts_with(HEADER_TOKEN)
}

/// Derives a sample name from a genotype column header such as
/// `./S01_unmerged.GT`.
pub fn sample_name(token: &str) -> String {
    let trimmed = token.trim_start_matches(['.', '/']);
    MERGE_SUFFIXES
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed)
        .to_string()
}

/// Parses a header line. Within-sample headers only need the four fixed columns;
/// across-sample headers must describe at least one genotype/depth pair.
pub fn parse_header(
    line: &str,
    line_number: usize,
    layout: TableLayout,
) -> Result<TableHeader, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_COLUMNS {
        return Err(ParseError::MalformedHeader {
            line: line_number,
            message: format!(
                "expected at least {MIN_COLUMNS} columns but found {}",
                fields.len()
            ),
        });
    }

    let sample_names = match layout {
        TableLayout::WithinSample => Vec::new(),
        TableLayout::AcrossSample => {
            let sample_columns = fields.len() - FIRST_SAMPLE_COLUMN;
            if sample_columns == 0 {
                return Err(ParseError::MalformedHeader {
                    line: line_number,
                    message: "no genotype/depth sample columns after column 4".into(),
                });
            }
            if sample_columns % 2 != 0 {
                return Err(ParseError::MalformedHeader {
                    line: line_number,
                    message: format!(
                        "sample columns must come in genotype/depth pairs, found {sample_columns} columns"
                    ),
                });
            }
            fields[FIRST_SAMPLE_COLUMN..]
                .iter()
                .step_by(2)
                .map(|token| sample_name(token))
                .collect()
        }
    };

    Ok(TableHeader {
        columns: fields.len(),
        sample_names,
    })
}

/// Turns data lines into [`Row`]s for one table layout.
#[derive(Clone, Debug)]
pub struct RowParser {
    layout: TableLayout,
    columns: usize,
}

impl RowParser {
    pub fn within_sample() -> Self {
        Self {
            layout: TableLayout::WithinSample,
            columns: MIN_COLUMNS,
        }
    }

    pub fn across_sample(header: &TableHeader) -> Self {
        Self {
            layout: TableLayout::AcrossSample,
            columns: header.columns,
        }
    }

    /// Parses one data line. Fields past the declared column count are ignored.
    pub fn parse(&self, line: &str, line_number: usize) -> Result<Row, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < self.columns {
            return Err(ParseError::TooFewFields {
                line: line_number,
                expected: self.columns,
                found: fields.len(),
            });
        }

        let chromosome = fields[CHROM_COLUMN];
        let position = parse_position(fields[POS_COLUMN], line_number)?;

        match self.layout {
            TableLayout::WithinSample => {
                let depth = parse_depth(fields[WITHIN_DEPTH_COLUMN], WITHIN_DEPTH_COLUMN, line_number)?;
                Ok(Row::within(chromosome, position, depth))
            }
            TableLayout::AcrossSample => {
                let mut samples = Vec::with_capacity((self.columns - FIRST_SAMPLE_COLUMN) / 2);
                for column in (FIRST_SAMPLE_COLUMN..self.columns).step_by(2) {
                    samples.push(SampleCall {
                        genotype: parse_genotype(fields[column]),
                        depth: parse_depth(fields[column + 1], column + 1, line_number)?,
                    });
                }
                Ok(Row::across(chromosome, position, samples))
            }
        }
    }
}

fn parse_position(value: &str, line_number: usize) -> Result<u64, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidInteger {
        line: line_number,
        column: POS_COLUMN,
        name: "position",
        value: value.to_string(),
    })
}

fn parse_depth(value: &str, column: usize, line_number: usize) -> Result<Depth, ParseError> {
    if value == MISSING_DEPTH {
        return Ok(Depth::MISSING);
    }
    value
        .parse()
        .map(Depth::new)
        .map_err(|_| ParseError::InvalidInteger {
            line: line_number,
            column,
            name: "depth",
            value: value.to_string(),
        })
}

fn parse_genotype(value: &str) -> Genotype {
    if value == MISSING_GENOTYPE {
        Genotype::Missing
    } else {
        Genotype::Called
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowData;

    const ACROSS_HEADER: &str =
        "CHROM\tPOS\tREF\tALT\t./S01_unmerged.GT\tS01_unmerged.DP\tS02_merged.GT\tS02_merged.DP";

    #[test]
    fn sample_names_drop_prefix_and_merge_suffix() {
        assert_eq!(sample_name("./S01_unmerged.GT"), "S01");
        assert_eq!(sample_name("S02_merged.GT"), "S02");
        assert_eq!(sample_name("plain.GT"), "plain");
        assert_eq!(sample_name("bare"), "bare");
    }

    #[test]
    fn across_header_yields_samples_in_column_order() {
        let header = parse_header(ACROSS_HEADER, 1, TableLayout::AcrossSample).unwrap();
        assert_eq!(header.columns, 8);
        assert_eq!(header.sample_names, vec!["S01", "S02"]);
    }

    #[test]
    fn across_header_rejects_unpaired_columns() {
        let err = parse_header("CHROM POS REF ALT S1.GT", 3, TableLayout::AcrossSample)
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { line: 3, .. }));

        let err = parse_header("CHROM POS REF ALT", 1, TableLayout::AcrossSample).unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader { .. }));
    }

    #[test]
    fn within_row_parses_sentinel_depth_as_missing() {
        let parser = RowParser::within_sample();
        let row = parser.parse("chr2\t1500\tA\tNA", 4).unwrap();
        assert_eq!(row.chromosome, "chr2");
        assert_eq!(row.position, 1500);
        assert_eq!(row.data, RowData::WithinSample { depth: Depth::MISSING });

        let row = parser.parse("chr2 1501 A 0", 5).unwrap();
        assert_eq!(row.depth(), Depth::new(0));
    }

    #[test]
    fn short_rows_are_fatal() {
        let parser = RowParser::within_sample();
        let err = parser.parse("1\t100\tA", 9).unwrap_err();
        assert_eq!(
            err,
            ParseError::TooFewFields {
                line: 9,
                expected: 4,
                found: 3
            }
        );

        let header = parse_header(ACROSS_HEADER, 1, TableLayout::AcrossSample).unwrap();
        let parser = RowParser::across_sample(&header);
        let err = parser.parse("1 100 A T 0/1 8 1/1", 2).unwrap_err();
        assert!(matches!(err, ParseError::TooFewFields { expected: 8, found: 7, .. }));
    }

    #[test]
    fn non_integer_fields_are_fatal() {
        let parser = RowParser::within_sample();
        let err = parser.parse("1 10x A 7", 2).unwrap_err();
        assert!(matches!(err, ParseError::InvalidInteger { name: "position", .. }));
        let err = parser.parse("1 -10 A 7", 2).unwrap_err();
        assert!(matches!(err, ParseError::InvalidInteger { name: "position", .. }));
        let err = parser.parse("1 10 A 3.5", 2).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidInteger {
                name: "depth",
                column: 3,
                ..
            }
        ));
    }

    #[test]
    fn negative_depth_is_kept_and_fails_thresholds() {
        let parser = RowParser::within_sample();
        let row = parser.parse("1 10 A -3", 2).unwrap();
        assert_eq!(row.depth(), Depth::new(-3));
        assert!(!row.depth().meets(0));
    }

    #[test]
    fn across_row_types_each_pair() {
        let header = parse_header(ACROSS_HEADER, 1, TableLayout::AcrossSample).unwrap();
        let parser = RowParser::across_sample(&header);
        let row = parser.parse("1 100 A T ./. 12 0/1 NA extra", 2).unwrap();
        let samples = row.samples();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].genotype.is_missing());
        assert_eq!(samples[0].depth, Depth::new(12));
        assert_eq!(samples[1].genotype, Genotype::Called);
        assert!(samples[1].depth.is_missing());
    }
}

//! Record parser
//!
//! Turns a delimited source file (first row = field names) into typed
//! import records for one entity kind. The whole file is buffered.
//!
//! Cell rules:
//! - empty cell: field absent (left unchanged on update, default on insert)
//! - `NULL`: field explicitly cleared (nullable fields and references only)
//! - header columns unknown to the kind, or naming derived fields, are ignored
//!
//! A cell that fails conversion excludes its row and is reported as a
//! `ParseError` issue; it never aborts the file.

use csv::{ReaderBuilder, StringRecord, Trim};
use pcat_common::catalog::{
    FieldSpec, FieldType, ForeignKeySpec, JoinSpec, IDENTITY_FIELD, NULL_TOKEN,
};
use pcat_common::{EntityKind, FieldPatch, FieldValue};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{IssueCode, SyncIssue};

/// One parsed source row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    /// Stable identity correlating the row with a stored entity
    pub id: i64,
    /// 1-based source line
    pub line: u64,
    /// Scalar and single-valued reference fields present in the row
    pub fields: BTreeMap<&'static str, FieldPatch>,
    /// Join lists whose column is present in the file (empty cell = empty set)
    pub joins: BTreeMap<&'static str, Vec<i64>>,
}

impl ImportRecord {
    pub fn new(id: i64, line: u64) -> Self {
        Self {
            id,
            line,
            fields: BTreeMap::new(),
            joins: BTreeMap::new(),
        }
    }
}

/// Parser output: accepted records plus rejected-row issues
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub records: Vec<ImportRecord>,
    pub issues: Vec<SyncIssue>,
}

/// Meaning of one header column
#[derive(Debug, Clone, Copy)]
enum Column {
    Identity,
    Field(&'static FieldSpec),
    ForeignKey(&'static ForeignKeySpec),
    Join(&'static JoinSpec),
    Ignored,
}

/// Parses source rows for one entity kind
#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    kind: EntityKind,
}

impl RecordParser {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }

    /// Parse a source file; a missing or unreadable file is fatal
    pub fn parse_file(&self, path: &Path) -> SyncResult<ParsedBatch> {
        let file = std::fs::File::open(path).map_err(|e| SyncError::SourceUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let batch = self.parse(file)?;
        info!(
            kind = %self.kind,
            records = batch.records.len(),
            rejected = batch.issues.len(),
            "Parsed {}",
            path.display()
        );
        Ok(batch)
    }

    /// Parse comma-separated rows with a header
    pub fn parse<R: Read>(&self, input: R) -> SyncResult<ParsedBatch> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(input);

        let headers = reader
            .headers()
            .map_err(|e| self.invalid_header(e.to_string()))?
            .clone();
        let columns = self.classify_headers(&headers)?;

        let mut batch = ParsedBatch::default();
        let mut seen = HashSet::new();
        let identity_index = columns.iter().position(|c| matches!(c, Column::Identity));

        // Raw rows first, so a row that is not valid UTF-8 still yields its identity
        for (index, result) in reader.byte_records().enumerate() {
            // Header is line 1
            let fallback_line = index as u64 + 2;
            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                    warn!(kind = %self.kind, line, "Unreadable row: {}", e);
                    batch
                        .issues
                        .push(SyncIssue::new(IssueCode::ParseError, e.to_string()).with_line(line));
                    continue;
                }
            };
            let line = raw.position().map(|p| p.line()).unwrap_or(fallback_line);
            let raw_identity = identity_index
                .and_then(|i| raw.get(i))
                .and_then(|cell| std::str::from_utf8(cell).ok())
                .and_then(|cell| cell.parse::<i64>().ok());

            let row = match StringRecord::from_byte_record(raw) {
                Ok(row) => row,
                Err(e) => {
                    warn!(kind = %self.kind, line, id = ?raw_identity, "Row is not valid UTF-8");
                    let mut issue =
                        SyncIssue::new(IssueCode::ParseError, format!("row is not valid UTF-8: {}", e)).with_line(line);
                    issue.identity = raw_identity;
                    batch.issues.push(issue);
                    continue;
                }
            };

            if row.iter().all(str::is_empty) {
                debug!(kind = %self.kind, line, "Skipping blank row");
                continue;
            }

            match self.parse_row(&columns, &row, line) {
                Ok(record) => {
                    if seen.insert(record.id) {
                        batch.records.push(record);
                    } else {
                        warn!(kind = %self.kind, line, id = record.id, "Duplicate identity");
                        batch.issues.push(
                            SyncIssue::new(
                                IssueCode::ParseError,
                                format!("duplicate identity {}; first occurrence kept", record.id),
                            )
                            .with_identity(record.id)
                            .with_line(line),
                        );
                    }
                }
                Err(issue) => {
                    warn!(kind = %self.kind, line, "{}", issue.message);
                    batch.issues.push(issue);
                }
            }
        }

        Ok(batch)
    }

    fn invalid_header(&self, message: String) -> SyncError {
        SyncError::InvalidHeader {
            kind: self.kind,
            message,
        }
    }

    fn classify_headers(&self, headers: &StringRecord) -> SyncResult<Vec<Column>> {
        let schema = self.kind.schema();
        let mut has_identity = false;

        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = if i == 0 { name.trim_start_matches('\u{feff}') } else { name };
                if name == IDENTITY_FIELD {
                    has_identity = true;
                    Column::Identity
                } else if let Some(field) = schema.field(name) {
                    Column::Field(field)
                } else if let Some(fk) = schema.foreign_key(name) {
                    Column::ForeignKey(fk)
                } else if let Some(join) = schema.join(name) {
                    Column::Join(join)
                } else {
                    if schema.is_derived(name) {
                        debug!(kind = %self.kind, column = name, "Ignoring derived column");
                    } else {
                        debug!(kind = %self.kind, column = name, "Ignoring unknown column");
                    }
                    Column::Ignored
                }
            })
            .collect();

        if !has_identity {
            return Err(self.invalid_header(format!("missing '{}' column", IDENTITY_FIELD)));
        }
        Ok(columns)
    }

    fn parse_row(&self, columns: &[Column], row: &StringRecord, line: u64) -> Result<ImportRecord, SyncIssue> {
        let mut id = None;
        let mut fields = BTreeMap::new();
        let mut joins = BTreeMap::new();
        let mut errors = Vec::new();

        for (column, cell) in columns.iter().zip(row.iter()) {
            match column {
                Column::Identity => match cell.parse::<i64>() {
                    Ok(v) => id = Some(v),
                    Err(_) if cell.is_empty() => errors.push("missing identity".to_string()),
                    Err(_) => errors.push(format!("identity '{}' is not an integer", cell)),
                },
                Column::Field(spec) => {
                    if cell.is_empty() {
                        continue;
                    }
                    match parse_field(spec, cell) {
                        Ok(patch) => {
                            fields.insert(spec.name, patch);
                        }
                        Err(e) => errors.push(e),
                    }
                }
                Column::ForeignKey(fk) => {
                    if cell.is_empty() {
                        continue;
                    }
                    if cell == NULL_TOKEN {
                        fields.insert(fk.field, FieldPatch::Clear);
                        continue;
                    }
                    match cell.parse::<i64>() {
                        Ok(v) => {
                            fields.insert(fk.field, FieldPatch::Set(FieldValue::Int(v)));
                        }
                        Err(_) => errors.push(format!("{}: '{}' is not an integer", fk.field, cell)),
                    }
                }
                Column::Join(join) => {
                    let ids = if cell == NULL_TOKEN { Ok(Vec::new()) } else { parse_id_list(cell) };
                    match ids {
                        Ok(ids) => {
                            joins.insert(join.field, ids);
                        }
                        Err(e) => errors.push(format!("{}: {}", join.field, e)),
                    }
                }
                Column::Ignored => {}
            }
        }

        // Short rows leave trailing join columns out; treat them as empty cells
        for column in columns.iter().skip(row.len()) {
            if let Column::Join(join) = column {
                joins.insert(join.field, Vec::new());
            }
        }

        let Some(id) = id else {
            if errors.is_empty() {
                errors.push("missing identity".to_string());
            }
            return Err(SyncIssue::new(IssueCode::ParseError, errors.join("; ")).with_line(line));
        };

        if !errors.is_empty() {
            return Err(SyncIssue::new(IssueCode::ParseError, errors.join("; "))
                .with_identity(id)
                .with_line(line));
        }

        Ok(ImportRecord {
            id,
            line,
            fields,
            joins,
        })
    }
}

fn parse_field(spec: &FieldSpec, cell: &str) -> Result<FieldPatch, String> {
    if cell == NULL_TOKEN {
        return if spec.nullable {
            Ok(FieldPatch::Clear)
        } else {
            Err(format!("{}: cannot clear a required field", spec.name))
        };
    }

    let value = match spec.ty {
        FieldType::Int => {
            let v = cell
                .parse::<i64>()
                .map_err(|_| format!("{}: '{}' is not an integer", spec.name, cell))?;
            if let Some((min, max)) = spec.range {
                if v < min || v > max {
                    return Err(format!("{}: {} outside {}..={}", spec.name, v, min, max));
                }
            }
            FieldValue::Int(v)
        }
        FieldType::Float => match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => FieldValue::Float(v),
            _ => return Err(format!("{}: '{}' is not a number", spec.name, cell)),
        },
        FieldType::Bool => FieldValue::Bool(
            parse_bool(cell).ok_or_else(|| format!("{}: '{}' is not a boolean", spec.name, cell))?,
        ),
        FieldType::Text => FieldValue::Text(cell.to_string()),
        FieldType::TextList => FieldValue::TextList(
            cell.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    };

    Ok(FieldPatch::Set(value))
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Comma-joined identities, duplicates collapsed, first-seen order kept
fn parse_id_list(cell: &str) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    for part in cell.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| format!("'{}' is not an integer id", part))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

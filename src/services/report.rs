//! Visits CSV report parser
//!
//! The report is two tables back to back:
//! - device summary: one aggregate row per device, then one row per animal
//! - visit listing: a `Visit` marker row followed by its event rows
//!
//! The tables are separated by a row with an empty `Device ID` or by blank
//! lines. A visit table header met in the summary also ends it.

use crate::domain::types::DeviceId;
use crate::domain::visit::VisitField;
use crate::error::ReportError;
use csv::StringRecord;
use std::collections::HashMap;
use tracing::debug;

const SUMMARY_TABLE: &str = "summary";
const VISITS_TABLE: &str = "visits";

const COL_DEVICE_ID: &str = "Device ID";
const COL_ANIMAL: &str = "Animal";
const COL_NUM_VISITS: &str = "# Visits";
const COL_AUDIO_BAIT: &str = "Using Audio Bait";
const COL_TYPE: &str = "Type";

/// Row of the device summary table
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub line: usize,
    pub device_id: DeviceId,
    /// `;`-joined on the aggregate row, a single animal on detail rows
    pub animal: String,
    pub visit_count: u32,
    pub using_audio_bait: bool,
}

impl SummaryRow {
    pub fn animals(&self) -> impl Iterator<Item = &str> {
        self.animal.split(';').map(str::trim).filter(|a| !a.is_empty())
    }
}

/// Aggregate row plus per-animal rows for one device
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub summary: SummaryRow,
    pub animals: HashMap<String, SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitRowKind {
    Visit,
    Event,
    AudioBait,
    Other(String),
}

impl VisitRowKind {
    fn parse(s: &str) -> Self {
        match s {
            "Visit" => VisitRowKind::Visit,
            "Event" => VisitRowKind::Event,
            "Audio Bait" => VisitRowKind::AudioBait,
            other => VisitRowKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VisitRowKind::Visit => "Visit",
            VisitRowKind::Event => "Event",
            VisitRowKind::AudioBait => "Audio Bait",
            VisitRowKind::Other(s) => s,
        }
    }
}

/// Row of the visit listing table
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRow {
    pub line: usize,
    pub kind: VisitRowKind,
    pub what: String,
    pub rec_id: Option<String>,
    pub start: String,
    pub end: Option<String>,
    pub audio_played: Option<String>,
}

impl VisitRow {
    /// Column value as rendered in the report, empty when blank
    pub fn field(&self, field: VisitField) -> &str {
        match field {
            VisitField::RecId => self.rec_id.as_deref().unwrap_or(""),
            VisitField::What => &self.what,
            VisitField::Start => &self.start,
            VisitField::End => self.end.as_deref().unwrap_or(""),
            VisitField::AudioPlayed => self.audio_played.as_deref().unwrap_or(""),
        }
    }
}

/// Parsed visits report
#[derive(Debug, Clone, Default)]
pub struct VisitsReport {
    devices: HashMap<DeviceId, DeviceSummary>,
    visit_rows: Vec<VisitRow>,
}

impl VisitsReport {
    pub fn device(&self, device_id: DeviceId) -> Option<&DeviceSummary> {
        self.devices.get(&device_id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn visit_rows(&self) -> &[VisitRow] {
        &self.visit_rows
    }

    /// Parse the raw report body. Quoted fields may span lines.
    pub fn parse(body: &str) -> Result<Self, ReportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());

        let mut parser = Parser::default();
        for result in reader.records() {
            let record = result.map_err(|source| ReportError::Csv {
                line: source.position().map_or(0, |p| p.line() as usize),
                source,
            })?;
            let line = record.position().map_or(0, |p| record_line(body, p));
            let record = if is_blank(&record) { None } else { Some(record) };
            parser.feed(line, record)?;
        }
        parser.finish()
    }
}

/// Header name -> position
struct Columns {
    table: &'static str,
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_header(table: &'static str, header: &StringRecord) -> Self {
        let mut index = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            let name = name.trim();
            if !name.is_empty() {
                index.entry(name.to_string()).or_insert(i);
            }
        }
        Self { table, index }
    }

    fn require(&self, column: &'static str) -> Result<usize, ReportError> {
        self.index
            .get(column)
            .copied()
            .ok_or(ReportError::MissingColumn { table: self.table, column })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

struct SummaryColumns {
    device_id: usize,
    animal: usize,
    visits: usize,
    audio_bait: usize,
}

impl SummaryColumns {
    fn new(header: &StringRecord) -> Result<Self, ReportError> {
        let columns = Columns::from_header(SUMMARY_TABLE, header);
        Ok(Self {
            device_id: columns.require(COL_DEVICE_ID)?,
            animal: columns.require(COL_ANIMAL)?,
            visits: columns.require(COL_NUM_VISITS)?,
            audio_bait: columns.require(COL_AUDIO_BAIT)?,
        })
    }
}

struct VisitColumns {
    kind: usize,
    what: usize,
    start: usize,
    rec_id: Option<usize>,
    end: Option<usize>,
    audio_played: Option<usize>,
}

impl VisitColumns {
    fn new(header: &StringRecord) -> Result<Self, ReportError> {
        let columns = Columns::from_header(VISITS_TABLE, header);
        Ok(Self {
            kind: columns.require(COL_TYPE)?,
            what: columns.require(VisitField::What.column())?,
            start: columns.require(VisitField::Start.column())?,
            rec_id: columns.optional(VisitField::RecId.column()),
            end: columns.optional(VisitField::End.column()),
            audio_played: columns.optional(VisitField::AudioPlayed.column()),
        })
    }
}

enum ParseState {
    ParsingSummary { columns: Option<SummaryColumns> },
    ParsingVisits { columns: Option<VisitColumns> },
}

struct Parser {
    state: ParseState,
    seen_any: bool,
    devices: HashMap<DeviceId, DeviceSummary>,
    visit_rows: Vec<VisitRow>,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            state: ParseState::ParsingSummary { columns: None },
            seen_any: false,
            devices: HashMap::new(),
            visit_rows: Vec::new(),
        }
    }
}

impl Parser {
    fn feed(&mut self, line_no: usize, record: Option<StringRecord>) -> Result<(), ReportError> {
        if record.is_some() {
            self.seen_any = true;
        }

        match &self.state {
            ParseState::ParsingSummary { columns: None } => {
                // Leading blank rows before the summary header
                if let Some(header) = record {
                    let columns = SummaryColumns::new(&header)?;
                    self.state = ParseState::ParsingSummary { columns: Some(columns) };
                }
            }
            ParseState::ParsingSummary { columns: Some(columns) } => match record {
                // Blank separator lines never reach here, the csv reader skips them
                Some(header) if is_visit_header(&header) => {
                    debug!(line = line_no, devices = self.devices.len(), "report_summary_end");
                    let columns = VisitColumns::new(&header)?;
                    self.state = ParseState::ParsingVisits { columns: Some(columns) };
                }
                Some(record) if !field(&record, columns.device_id).is_empty() => {
                    let row = parse_summary_row(line_no, &record, columns)?;
                    add_summary_row(&mut self.devices, row);
                }
                _ => {
                    debug!(line = line_no, devices = self.devices.len(), "report_summary_end");
                    self.state = ParseState::ParsingVisits { columns: None };
                }
            },
            ParseState::ParsingVisits { columns: None } => {
                if let Some(header) = record {
                    let columns = VisitColumns::new(&header)?;
                    self.state = ParseState::ParsingVisits { columns: Some(columns) };
                }
            }
            ParseState::ParsingVisits { columns: Some(columns) } => {
                if let Some(record) = record {
                    self.visit_rows.push(parse_visit_row(line_no, &record, columns));
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<VisitsReport, ReportError> {
        if !self.seen_any {
            return Err(ReportError::Empty);
        }
        if let ParseState::ParsingSummary { columns: None } = self.state {
            return Err(ReportError::MissingHeader { table: SUMMARY_TABLE });
        }

        debug!(
            devices = self.devices.len(),
            visit_rows = self.visit_rows.len(),
            "report_parsed"
        );
        Ok(VisitsReport { devices: self.devices, visit_rows: self.visit_rows })
    }
}

/// First row seen for a device is its aggregate, later rows are per animal
fn add_summary_row(devices: &mut HashMap<DeviceId, DeviceSummary>, row: SummaryRow) {
    match devices.get_mut(&row.device_id) {
        Some(summary) => {
            summary.animals.insert(row.animal.clone(), row);
        }
        None => {
            devices.insert(row.device_id, DeviceSummary { summary: row, animals: HashMap::new() });
        }
    }
}

/// Every field empty after trimming, e.g. `,,,,` or a line of spaces
fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// The visit table header, met while still in the summary table
fn is_visit_header(record: &StringRecord) -> bool {
    record.iter().any(|f| f.trim() == COL_TYPE)
}

/// 1-based line a record starts on. The reader may report the start of
/// the empty lines it skipped before the record.
fn record_line(body: &str, position: &csv::Position) -> usize {
    let rest = body.get(position.byte() as usize..).unwrap_or("");
    let skipped = rest.lines().take_while(|l| l.is_empty()).count();
    position.line() as usize + skipped
}

/// Rows may be shorter than the header
#[inline]
fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn optional_field(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    let value = field(record, idx?);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_summary_row(
    line: usize,
    record: &StringRecord,
    columns: &SummaryColumns,
) -> Result<SummaryRow, ReportError> {
    let device_id = field(record, columns.device_id);
    let device_id = device_id.parse::<DeviceId>().map_err(|_| ReportError::InvalidNumber {
        line,
        column: COL_DEVICE_ID,
        value: device_id.to_string(),
    })?;

    let visits = field(record, columns.visits);
    let visit_count = visits.parse::<u32>().map_err(|_| ReportError::InvalidNumber {
        line,
        column: COL_NUM_VISITS,
        value: visits.to_string(),
    })?;

    Ok(SummaryRow {
        line,
        device_id,
        animal: field(record, columns.animal).to_string(),
        visit_count,
        using_audio_bait: parse_bool(line, COL_AUDIO_BAIT, field(record, columns.audio_bait))?,
    })
}

fn parse_visit_row(line: usize, record: &StringRecord, columns: &VisitColumns) -> VisitRow {
    VisitRow {
        line,
        kind: VisitRowKind::parse(field(record, columns.kind)),
        what: field(record, columns.what).to_string(),
        rec_id: optional_field(record, columns.rec_id),
        start: field(record, columns.start).to_string(),
        end: optional_field(record, columns.end),
        audio_played: optional_field(record, columns.audio_played),
    }
}

/// Accepts `true`/`false` as the service writes them, and `1`/`0`
pub fn parse_bool(line: usize, column: &'static str, value: &str) -> Result<bool, ReportError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ReportError::InvalidBool { line, column, value: value.to_string() }),
    }
}

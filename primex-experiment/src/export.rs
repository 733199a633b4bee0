//! Flat tables for delimited text and spreadsheet output.

use std::fmt;
use std::io;

use primex_core::{TrialCondition, TrialResult};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::aggregator::SummaryStatistics;
use crate::config::ParadigmKind;
use crate::error::{Error, Result};
use crate::persistence::ResultRecord;

const BOM: &[u8] = "\u{feff}".as_bytes();

/// One typed value. A spreadsheet writer can keep the types; CSV renders them.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(true) => f.write_str("Yes"),
            Cell::Bool(false) => f.write_str("No"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Empty, Cell::Float)
    }
}

impl From<Option<bool>> for Cell {
    fn from(v: Option<bool>) -> Self {
        v.map_or(Cell::Empty, Cell::Bool)
    }
}

impl From<Option<&str>> for Cell {
    fn from(v: Option<&str>) -> Self {
        v.map_or(Cell::Empty, text)
    }
}

fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvOptions {
    /// Prefix a UTF-8 byte-order mark so spreadsheet tools detect the encoding.
    pub bom: bool,
}

impl ResultTable {
    pub fn write_csv<W: io::Write>(&self, mut out: W, options: CsvOptions) -> Result<()> {
        if options.bom {
            out.write_all(BOM)
                .map_err(|e| Error::Export(e.to_string()))?;
        }
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .from_writer(out);
        writer
            .write_record(&self.columns)
            .map_err(|e| Error::Export(e.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|c| c.to_string()))
                .map_err(|e| Error::Export(e.to_string()))?;
        }
        writer.flush().map_err(|e| Error::Export(e.to_string()))
    }

    pub fn to_csv_string(&self, options: CsvOptions) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf, options)?;
        String::from_utf8(buf).map_err(|e| Error::Export(e.to_string()))
    }

    /// Bold header row, then one typed cell per value. Empty cells stay blank.
    fn write_sheet(&self, sheet: &mut Worksheet, header: &Format) -> std::result::Result<(), XlsxError> {
        for (col, name) in self.columns.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, header)?;
        }
        for (i, cells) in self.rows.iter().enumerate() {
            let row = i as u32 + 1;
            for (col, cell) in cells.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Int(v) => {
                        sheet.write_number(row, col, *v as f64)?;
                    }
                    Cell::Float(v) => {
                        sheet.write_number(row, col, *v)?;
                    }
                    Cell::Bool(v) => {
                        sheet.write_boolean(row, col, *v)?;
                    }
                    Cell::Text(v) => {
                        sheet.write_string(row, col, v)?;
                    }
                }
            }
        }
        sheet.autofit();
        Ok(())
    }
}

/// Name of the sheet holding one row per trial.
pub const RAW_DATA_SHEET: &str = "Raw Data";
/// Name of the sheet holding the metric/value summary.
pub const SUMMARY_SHEET: &str = "Summary";

/// An `.xlsx` workbook with one sheet per `(name, table)` pair, in order.
pub fn workbook(sheets: &[(&str, &ResultTable)]) -> Result<Vec<u8>> {
    let xlsx = |e: XlsxError| Error::Export(e.to_string());
    let mut book = Workbook::new();
    let header = Format::new().set_bold();
    for (name, table) in sheets {
        let sheet = book.add_worksheet();
        sheet.set_name(*name).map_err(xlsx)?;
        table.write_sheet(sheet, &header).map_err(xlsx)?;
    }
    book.save_to_buffer().map_err(xlsx)
}

const STROOP_COLUMNS: [&str; 10] = [
    "Trial",
    "Language",
    "Word",
    "Word Meaning",
    "Ink Color",
    "Congruent",
    "Response",
    "Correct",
    "RT (ms)",
    "Timestamp",
];

const NUMBER_COLUMNS: [&str; 10] = [
    "Trial",
    "Prime",
    "Target",
    "Congruent",
    "Correct Response",
    "Response",
    "Correct",
    "RT (ms)",
    "Timeout",
    "Timestamp",
];

const GENERIC_COLUMNS: [&str; 11] = [
    "Trial",
    "Prime",
    "Target",
    "Condition",
    "Baseline",
    "Correct Response",
    "Response",
    "Correct",
    "RT (ms)",
    "Timeout",
    "Timestamp",
];

pub fn columns(paradigm: ParadigmKind) -> &'static [&'static str] {
    match paradigm {
        ParadigmKind::Stroop => &STROOP_COLUMNS,
        ParadigmKind::NumberPriming => &NUMBER_COLUMNS,
        ParadigmKind::GenericPriming => &GENERIC_COLUMNS,
    }
}

/// One row per result in play order. Results from another paradigm leave
/// their paradigm-specific cells empty.
pub fn result_table(results: &[TrialResult], paradigm: ParadigmKind) -> ResultTable {
    let rows = results.iter().map(|r| row(r, paradigm)).collect();
    ResultTable {
        columns: columns(paradigm).to_vec(),
        rows,
    }
}

fn row(r: &TrialResult, paradigm: ParadigmKind) -> Vec<Cell> {
    let trial = Cell::Int(r.trial_number as i64);
    let response = Cell::from(r.response.as_deref());
    let correct = Cell::from(r.correct);
    let rt = Cell::from(r.rt_ms);
    let timestamp = Cell::Text(r.timestamp.to_rfc3339());
    let answer = Cell::from(r.correct_response.as_deref());

    match (paradigm, &r.condition) {
        (
            ParadigmKind::Stroop,
            TrialCondition::Stroop {
                language,
                ink_color,
                word,
                word_meaning,
                congruent,
                ..
            },
        ) => vec![
            trial,
            text(language),
            text(word),
            text(word_meaning),
            text(ink_color),
            Cell::Bool(*congruent),
            response,
            correct,
            rt,
            timestamp,
        ],
        (
            ParadigmKind::NumberPriming,
            TrialCondition::NumberPriming {
                prime,
                target,
                congruent,
            },
        ) => vec![
            trial,
            Cell::Int(*prime),
            Cell::Int(*target),
            Cell::Bool(*congruent),
            answer,
            response,
            correct,
            rt,
            Cell::Bool(r.is_timeout()),
            timestamp,
        ],
        (
            ParadigmKind::GenericPriming,
            TrialCondition::GenericPriming {
                prime,
                target,
                condition,
                baseline,
                ..
            },
        ) => vec![
            trial,
            text(prime),
            text(target),
            text(condition),
            Cell::from(*baseline),
            answer,
            response,
            correct,
            rt,
            Cell::Bool(r.is_timeout()),
            timestamp,
        ],
        _ => {
            let mut cells = vec![Cell::Empty; columns(paradigm).len()];
            cells[0] = trial;
            cells
        }
    }
}

const RECORD_COLUMNS: [&str; 24] = [
    "trial_number",
    "paradigm",
    "language",
    "word",
    "word_meaning",
    "ink_color",
    "ink_hex",
    "prime",
    "target",
    "condition",
    "congruent",
    "baseline",
    "correct_response",
    "response",
    "correct",
    "rt",
    "timeout",
    "timestamp",
    "experiment_id",
    "experiment_name",
    "participant_id",
    "external_id",
    "experimenter_email",
    "user_experiment_id",
];

/// Stored rows as they come back from a gateway, every paradigm in one table.
pub fn record_table(records: &[ResultRecord]) -> ResultTable {
    let opt = |v: &Option<String>| Cell::from(v.as_deref());
    let rows = records
        .iter()
        .map(|r| {
            vec![
                Cell::Int(r.trial_number as i64),
                text(&r.paradigm),
                opt(&r.language),
                opt(&r.word),
                opt(&r.word_meaning),
                opt(&r.ink_color),
                opt(&r.ink_hex),
                opt(&r.prime),
                opt(&r.target),
                opt(&r.condition),
                Cell::from(r.congruent),
                Cell::from(r.baseline),
                opt(&r.correct_response),
                opt(&r.response),
                Cell::from(r.correct),
                Cell::from(r.rt),
                Cell::Bool(r.timeout),
                Cell::Text(r.timestamp.to_rfc3339()),
                text(&r.experiment_id),
                text(&r.experiment_name),
                text(&r.participant_id),
                opt(&r.external_id),
                opt(&r.experimenter_email),
                opt(&r.user_experiment_id),
            ]
        })
        .collect();
    ResultTable {
        columns: RECORD_COLUMNS.to_vec(),
        rows,
    }
}

fn round1(v: Option<f64>) -> Cell {
    v.map(|x| (x * 10.0).round() / 10.0).into()
}

/// Two-column metric/value table of the headline statistics.
pub fn summary_table(summary: &SummaryStatistics) -> ResultTable {
    let mut rows = vec![
        vec![text("Paradigm"), text(summary.paradigm.as_str())],
        vec![text("Total Trials"), Cell::Int(summary.total_trials as i64)],
        vec![text("Correct"), Cell::Int(summary.correct_count as i64)],
        vec![text("Timeouts"), Cell::Int(summary.timeouts as i64)],
        vec![text("Accuracy (%)"), round1(summary.accuracy)],
        vec![text("Error Rate (%)"), round1(summary.error_rate)],
        vec![text("Mean RT (ms)"), round1(summary.mean_rt)],
        vec![text("Median RT (ms)"), round1(summary.median_rt)],
        vec![text("SD RT (ms)"), round1(summary.sd_rt)],
        vec![text("Treatment Mean RT (ms)"), round1(summary.treatment_mean_rt)],
        vec![text("Baseline Mean RT (ms)"), round1(summary.baseline_mean_rt)],
        vec![text("Effect (ms)"), round1(summary.effect)],
    ];
    for lang in &summary.languages {
        rows.push(vec![
            Cell::Text(format!("Effect {} (ms)", lang.language)),
            round1(lang.effect),
        ]);
    }
    if let Some(dominant) = summary.dominant_language() {
        rows.push(vec![text("Dominant Language"), text(&dominant.language)]);
    }
    for cond in &summary.conditions {
        rows.push(vec![
            Cell::Text(format!("Mean RT {} (ms)", cond.condition)),
            round1(cond.mean_rt),
        ]);
    }
    ResultTable {
        columns: vec!["Metric", "Value"],
        rows,
    }
}

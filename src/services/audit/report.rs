use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use color_eyre::eyre::{Result, WrapErr};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};

use crate::services::audit::{AuditRecord, Reason, RunContext};

pub const SUMMARY_SHEET_NAME: &str = "Run Summary";
pub const AUDIT_SHEET_NAME: &str = "Audit Report";
pub const AUDIT_HEADERS: [&str; 7] = [
    "Reason",
    "Artist",
    "Title",
    "Old Album Name",
    "Old Track Id",
    "New Album Name",
    "New Track Id",
];

/// Extra characters added to the longest value of a column
const COLUMN_PADDING: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total: usize,
    pub clean: usize,
    pub unplayable: usize,
    pub relinked: usize,
    pub replacements_found: usize,
}

impl AuditStats {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total += 1;
            match record.reason {
                Reason::Ok => stats.clean += 1,
                Reason::Unplayable => stats.unplayable += 1,
                Reason::Relinked => stats.relinked += 1,
            }
            if record.has_substitute() {
                stats.replacements_found += 1;
            }
            stats
        })
    }
}

pub fn print_summary(source_name: &str, stats: &AuditStats) {
    let rule = "=".repeat(40);
    println!("\n{}\n           Scan Complete - {}\n{}", rule, source_name, rule);
    println!("Total Tracks Audited: {}", stats.total);
    println!("  - Clean:      {}", stats.clean);
    println!("  - Unplayable: {}", stats.unplayable);
    println!("  - Re-linked:  {}", stats.relinked);
    println!("Total Replacements Found: {}", stats.replacements_found);
    println!("{}", rule);
}

/// Everything the summary sheet records about a run
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Local>,
    pub user_display_name: String,
    pub context: RunContext,
}

pub fn report_file_name(generated_at: &DateTime<Local>) -> String {
    format!(
        "spotify_song_audit_{}.xlsx",
        generated_at.format("%Y%m%d-%H%M")
    )
}

/// One row of the summary sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryRow {
    Title(String),
    Parameter(String, String),
    Blank,
    Header(String, String),
    Statistic(String, usize),
}

impl SummaryRow {
    fn cells(&self) -> Vec<String> {
        match self {
            Self::Title(title) => vec![title.clone()],
            Self::Parameter(name, value) | Self::Header(name, value) => {
                vec![name.clone(), value.clone()]
            }
            Self::Blank => Vec::new(),
            Self::Statistic(name, count) => vec![name.clone(), count.to_string()],
        }
    }
}

pub fn summary_rows(metadata: &ReportMetadata, stats: &AuditStats) -> Vec<SummaryRow> {
    let context = &metadata.context;
    let parameter = |name: &str, value: String| SummaryRow::Parameter(name.to_string(), value);
    let statistic = |name: &str, count: usize| SummaryRow::Statistic(name.to_string(), count);

    vec![
        SummaryRow::Title("Run Parameters".into()),
        parameter(
            "Timestamp",
            metadata.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        parameter("Authenticated User", metadata.user_display_name.clone()),
        parameter("Source Audited", context.source_name.clone()),
        parameter(
            "Run Mode",
            if context.dry_run {
                "Dry Run (No Changes Made)".into()
            } else {
                "Live Run (Changes Made)".into()
            },
        ),
        parameter("Market", context.market.clone()),
        parameter(
            "Test Mode Artist",
            context
                .test_artist
                .clone()
                .unwrap_or_else(|| "N/A (Full Run)".into()),
        ),
        SummaryRow::Blank,
        SummaryRow::Title("Scan Statistics".into()),
        SummaryRow::Header("Category".into(), "Count".into()),
        statistic("Total Tracks Audited", stats.total),
        statistic("Clean Tracks", stats.clean),
        statistic("Unplayable Tracks", stats.unplayable),
        statistic("Re-linked Tracks", stats.relinked),
        statistic("Replacements Found", stats.replacements_found),
    ]
}

/// Header followed by one row per record, in audit order
pub fn audit_rows(records: &[AuditRecord]) -> Vec<Vec<String>> {
    let header = AUDIT_HEADERS.iter().map(|header| header.to_string()).collect();
    std::iter::once(header)
        .chain(records.iter().map(|record| {
            vec![
                record.reason.to_string(),
                record.artist.clone(),
                record.title.clone(),
                record.old_album.clone(),
                record.old_id.clone(),
                record.new_album.clone(),
                record.new_id.clone(),
            ]
        }))
        .collect()
}

/// Width of each column: its longest value plus padding
pub fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        for (column, value) in row.iter().enumerate() {
            let width = value.chars().count() + COLUMN_PADDING;
            match widths.get_mut(column) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }
    widths
}

fn apply_column_widths(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (column, width) in column_widths(rows).into_iter().enumerate() {
        worksheet.set_column_width(column as u16, width as f64)?;
    }
    Ok(())
}

fn summary_worksheet(rows: &[SummaryRow]) -> Result<Worksheet> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(SUMMARY_SHEET_NAME)?;

    let title = Format::new().set_bold().set_font_size(14);
    let bold = Format::new().set_bold();
    let bold_right = Format::new().set_bold().set_align(FormatAlign::Right);
    let right = Format::new().set_align(FormatAlign::Right);

    for (row, summary_row) in rows.iter().enumerate() {
        let row = row as u32;
        match summary_row {
            SummaryRow::Title(text) => {
                worksheet.write_string_with_format(row, 0, text, &title)?;
            }
            SummaryRow::Parameter(name, value) => {
                worksheet.write_string(row, 0, name)?;
                worksheet.write_string(row, 1, value)?;
            }
            SummaryRow::Blank => {}
            SummaryRow::Header(name, value) => {
                worksheet.write_string_with_format(row, 0, name, &bold)?;
                worksheet.write_string_with_format(row, 1, value, &bold_right)?;
            }
            SummaryRow::Statistic(name, count) => {
                worksheet.write_string(row, 0, name)?;
                worksheet.write_number_with_format(row, 1, *count as f64, &right)?;
            }
        }
    }

    let cells: Vec<Vec<String>> = rows.iter().map(SummaryRow::cells).collect();
    apply_column_widths(&mut worksheet, &cells)?;
    Ok(worksheet)
}

fn audit_worksheet(rows: &[Vec<String>]) -> Result<Worksheet> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(AUDIT_SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (row, values) in rows.iter().enumerate() {
        for (column, value) in values.iter().enumerate() {
            if row == 0 {
                worksheet.write_string_with_format(0, column as u16, value, &bold)?;
            } else if !value.is_empty() {
                worksheet.write_string(row as u32, column as u16, value)?;
            }
        }
    }

    apply_column_widths(&mut worksheet, rows)?;
    Ok(worksheet)
}

/// The summary sheet followed by the audit sheet
pub fn build_workbook(metadata: &ReportMetadata, records: &[AuditRecord]) -> Result<Workbook> {
    let stats = AuditStats::from_records(records);
    let mut workbook = Workbook::new();
    workbook.push_worksheet(summary_worksheet(&summary_rows(metadata, &stats))?);
    workbook.push_worksheet(audit_worksheet(&audit_rows(records))?);
    Ok(workbook)
}

/// Write the two-sheet audit workbook into `output_dir`.
///
/// Returns `None` without touching the filesystem when nothing was audited.
pub fn write_report(
    output_dir: &Path,
    metadata: &ReportMetadata,
    records: &[AuditRecord],
) -> Result<Option<PathBuf>> {
    if records.is_empty() {
        return Ok(None);
    }

    let mut workbook = build_workbook(metadata, records)?;
    let path = output_dir.join(report_file_name(&metadata.generated_at));
    workbook
        .save(&path)
        .wrap_err_with(|| format!("Failed to write report: {}", path.display()))?;

    log::info!("Wrote audit report with {} rows to {}", records.len(), path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(reason: Reason, artist: &str, title: &str, new_id: &str) -> AuditRecord {
        AuditRecord {
            artist: artist.into(),
            title: title.into(),
            old_album: "Old".into(),
            old_id: format!("{}-old", title),
            new_album: if new_id.is_empty() { "" } else { "New" }.into(),
            new_id: new_id.into(),
            reason,
        }
    }

    fn metadata(dry_run: bool, test_artist: Option<&str>) -> ReportMetadata {
        ReportMetadata {
            generated_at: Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 42).unwrap(),
            user_display_name: "Me".into(),
            context: RunContext {
                dry_run,
                market: "BE".into(),
                test_artist: test_artist.map(String::from),
                source_name: "Liked Songs".into(),
            },
        }
    }

    fn sample_records() -> Vec<AuditRecord> {
        vec![
            record(Reason::Ok, "Band", "Fine", ""),
            record(Reason::Relinked, "Band", "Moved", "n1"),
            record(Reason::Unplayable, "Solo", "Gone", "n2"),
            record(Reason::Unplayable, "Solo", "Lost", ""),
        ]
    }

    #[test]
    fn test_stats_from_records() {
        let stats = AuditStats::from_records(&sample_records());
        assert_eq!(
            stats,
            AuditStats {
                total: 4,
                clean: 1,
                unplayable: 2,
                relinked: 1,
                replacements_found: 2,
            }
        );
    }

    #[test]
    fn test_report_file_name() {
        let generated_at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 42).unwrap();
        assert_eq!(
            report_file_name(&generated_at),
            "spotify_song_audit_20260307-0905.xlsx"
        );
    }

    #[test]
    fn test_summary_rows_layout() {
        let stats = AuditStats::from_records(&sample_records());
        let rows = summary_rows(&metadata(true, None), &stats);

        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0], SummaryRow::Title("Run Parameters".into()));
        assert_eq!(
            rows[1],
            SummaryRow::Parameter("Timestamp".into(), "2026-03-07 09:05:42".into())
        );
        assert_eq!(
            rows[4],
            SummaryRow::Parameter("Run Mode".into(), "Dry Run (No Changes Made)".into())
        );
        assert_eq!(
            rows[6],
            SummaryRow::Parameter("Test Mode Artist".into(), "N/A (Full Run)".into())
        );
        assert_eq!(rows[7], SummaryRow::Blank);
        assert_eq!(rows[9], SummaryRow::Header("Category".into(), "Count".into()));
        assert_eq!(rows[10], SummaryRow::Statistic("Total Tracks Audited".into(), 4));
        assert_eq!(rows[14], SummaryRow::Statistic("Replacements Found".into(), 2));
    }

    #[test]
    fn test_summary_rows_live_run_with_artist() {
        let rows = summary_rows(&metadata(false, Some("Solo")), &AuditStats::default());
        assert_eq!(
            rows[4],
            SummaryRow::Parameter("Run Mode".into(), "Live Run (Changes Made)".into())
        );
        assert_eq!(
            rows[6],
            SummaryRow::Parameter("Test Mode Artist".into(), "Solo".into())
        );
    }

    #[test]
    fn test_audit_rows_keep_order_and_headers() {
        let rows = audit_rows(&sample_records());

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], AUDIT_HEADERS.to_vec());
        assert_eq!(
            rows[2],
            vec!["Re-linked", "Band", "Moved", "Old", "Moved-old", "New", "n1"]
        );
        let reasons: Vec<&str> = rows[1..].iter().map(|row| row[0].as_str()).collect();
        assert_eq!(reasons, vec!["OK", "Re-linked", "Unplayable", "Unplayable"]);
    }

    #[test]
    fn test_column_widths() {
        let rows = vec![
            vec!["ab".to_string(), "x".to_string()],
            vec!["abcdef".to_string()],
            vec!["é".to_string(), "xyz".to_string(), "1".to_string()],
        ];
        assert_eq!(column_widths(&rows), vec![8, 5, 3]);
    }

    #[test]
    fn test_workbook_has_summary_then_audit_sheet() {
        let mut workbook = build_workbook(&metadata(false, None), &sample_records()).unwrap();

        assert_eq!(
            workbook.worksheet_from_index(0).unwrap().name(),
            SUMMARY_SHEET_NAME
        );
        assert_eq!(
            workbook.worksheet_from_index(1).unwrap().name(),
            AUDIT_SHEET_NAME
        );
        assert!(workbook.worksheet_from_index(2).is_err());
    }

    #[test]
    fn test_no_report_for_empty_audit() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_report(dir.path(), &metadata(true, None), &[]).unwrap();

        assert!(path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_report_creates_workbook() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_report(dir.path(), &metadata(true, None), &sample_records())
            .unwrap()
            .unwrap();

        assert_eq!(path, dir.path().join("spotify_song_audit_20260307-0905.xlsx"));
        let bytes = std::fs::read(&path).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }
}

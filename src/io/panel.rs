//! Historical rate panel CSV ingest.
//!
//! Layout: a header `date,<maturity>,<maturity>,...` followed by one row per
//! observation date. Maturity headers are years and may carry a `y`/`Y`
//! suffix (`10Y`). Dates are `YYYY-MM-DD`.
//!
//! - header problems are fatal (exit code 2)
//! - malformed rows are skipped and reported
//! - rows are sorted ascending by date and filtered to an inclusive window

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use nalgebra::DMatrix;

use crate::domain::{MaturityGrid, RatePanel};
use crate::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the filtered panel plus what was skipped.
#[derive(Debug, Clone)]
pub struct PanelData {
    pub panel: RatePanel,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Rows inside the date window.
    pub rows_used: usize,
}

/// Load a rate panel and keep rows with `start <= date <= end`.
pub fn load_panel(path: &Path, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<PanelData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open panel CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read panel CSV headers: {e}")))?
        .clone();
    let maturities = parse_maturity_headers(&headers)?;
    let n = maturities.len();

    let mut rows: Vec<(NaiveDate, usize, Vec<f64>)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, n) {
            Ok((date, values)) => rows.push((date, line, values)),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|(date, line, _)| (*date, *line));
    let mut deduped: Vec<(NaiveDate, usize, Vec<f64>)> = Vec::with_capacity(rows.len());
    for row in rows {
        match deduped.last() {
            Some((prev, _, _)) if *prev == row.0 => row_errors.push(RowError {
                line: row.1,
                message: format!("duplicate date {}", row.0),
            }),
            _ => deduped.push(row),
        }
    }
    row_errors.sort_by_key(|e| e.line);

    let dates: Vec<NaiveDate> = deduped.iter().map(|(d, _, _)| *d).collect();
    let rates = DMatrix::from_fn(deduped.len(), n, |i, j| deduped[i].2[j]);
    let panel = RatePanel::new(dates, maturities, rates)?.filter_dates(start, end);

    let rows_used = panel.n_rows();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid panel rows inside the requested date window."));
    }

    Ok(PanelData {
        panel,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Write a panel in the layout [`load_panel`] reads.
pub fn write_panel_csv(path: &Path, panel: &RatePanel) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create panel CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write panel CSV: {e}"));

    let mut header = vec!["date".to_string()];
    header.extend(panel.maturities.as_slice().iter().map(|t| t.to_string()));
    writer.write_record(&header).map_err(write_err)?;

    for (i, date) in panel.dates.iter().enumerate() {
        let mut record = vec![date.format(DATE_FORMAT).to_string()];
        record.extend(panel.rates.row(i).iter().map(|v| format!("{v:.6}")));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush panel CSV: {e}")))?;
    Ok(())
}

fn parse_maturity_headers(headers: &StringRecord) -> Result<MaturityGrid, AppError> {
    if headers.len() < 2 {
        return Err(AppError::new(
            2,
            "Panel CSV needs a date column followed by at least one maturity column.",
        ));
    }
    let maturities = headers
        .iter()
        .skip(1)
        .map(|h| {
            let name = h.trim().trim_start_matches('\u{feff}');
            name.trim_end_matches(['y', 'Y'])
                .trim()
                .parse::<f64>()
                .map_err(|_| AppError::new(2, format!("Invalid maturity header '{name}' (expected years, e.g. 10 or 10Y).")))
        })
        .collect::<Result<Vec<f64>, AppError>>()?;
    Ok(MaturityGrid::new(maturities)?)
}

fn parse_row(record: &StringRecord, n: usize) -> Result<(NaiveDate, Vec<f64>), String> {
    if record.len() != n + 1 {
        return Err(format!("expected {} fields, found {}", n + 1, record.len()));
    }
    let raw_date = record.get(0).unwrap_or_default();
    let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
        .map_err(|_| format!("invalid date '{raw_date}' (expected YYYY-MM-DD)"))?;
    let values = record
        .iter()
        .skip(1)
        .map(|field| {
            field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("invalid rate '{field}'"))
        })
        .collect::<Result<Vec<f64>, String>>()?;
    Ok((date, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_csv(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("esg-panel-{}-{name}.csv", std::process::id()));
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_sorts_and_filters() {
        let path = temp_csv(
            "basic",
            "date,1Y,5Y,10y\n\
             2024-01-04,1.3,2.3,2.8\n\
             2024-01-02,1.1,2.1,2.6\n\
             2024-01-03,1.2,2.2,2.7\n\
             2024-01-05,1.4,2.4,2.9\n",
        );
        let data = load_panel(&path, Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()), None).unwrap();
        assert_eq!(data.panel.maturities.as_slice(), &[1.0, 5.0, 10.0]);
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.panel.dates[0], NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(data.panel.last_row().unwrap(), vec![1.4, 2.4, 2.9]);
        assert!(data.row_errors.is_empty());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let path = temp_csv(
            "bad",
            "date,1,5\n\
             2024-01-02,1.1,2.1\n\
             not-a-date,1.2,2.2\n\
             2024-01-04,1.3\n\
             2024-01-05,1.4,abc\n\
             2024-01-02,9.9,9.9\n\
             2024-01-08,1.5,2.5\n",
        );
        let data = load_panel(&path, None, None).unwrap();
        assert_eq!(data.rows_used, 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        assert_eq!(data.panel.rates[(0, 0)], 1.1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn empty_window_is_exit_code_3() {
        let path = temp_csv("window", "date,1,5\n2024-01-02,1.1,2.1\n");
        let err = load_panel(&path, Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), None).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn bad_header_is_exit_code_2() {
        let path = temp_csv("header", "date,one,five\n2024-01-02,1.1,2.1\n");
        assert_eq!(load_panel(&path, None, None).unwrap_err().exit_code(), 2);
        std::fs::remove_file(path).ok();

        let missing = std::env::temp_dir().join("esg-panel-does-not-exist.csv");
        assert_eq!(load_panel(&missing, None, None).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn written_panel_reads_back() {
        let panel = RatePanel::new(
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ],
            MaturityGrid::new(vec![0.5, 2.0]).unwrap(),
            DMatrix::from_row_slice(2, 2, &[1.25, 2.5, 1.5, 2.75]),
        )
        .unwrap();
        let path = std::env::temp_dir().join(format!("esg-panel-{}-written.csv", std::process::id()));
        write_panel_csv(&path, &panel).unwrap();
        let back = load_panel(&path, None, None).unwrap().panel;
        assert_eq!(back.dates, panel.dates);
        assert_eq!(back.maturities, panel.maturities);
        assert_eq!(back.rates, panel.rates);
        std::fs::remove_file(path).ok();
    }
}

//! Run artifacts on disk: trace CSVs, per-location value CSVs and JSON.
//!
//! Trace CSV layout (one row per location):
//!
//! ```text
//! location,<t0>,<t1>,...
//! 0,84,80.21346...,...
//! ```
//!
//! Value CSV layout (one row per location): `location,<name>`.
//!
//! Values are written in their shortest round-trip form, so files read back
//! bit-exact. Readers accept quoted cells and surrounding whitespace.

use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;

use crate::domain::{SignalSet, SignalTrace};
use crate::error::AppError;

/// Create the output directory (and parents) if needed.
pub fn ensure_dir(path: &Path) -> Result<(), AppError> {
    create_dir_all(path)
        .map_err(|e| AppError::io(format!("Failed to create directory '{}': {e}", path.display())))
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))
}

fn write_err(path: &Path, e: std::io::Error) -> AppError {
    AppError::io(format!("Failed to write '{}': {e}", path.display()))
}

/// Write one trace per location with the sample times in the header.
pub fn write_signal_csv(path: &Path, times: &[f64], set: &SignalSet) -> Result<(), AppError> {
    let mut file = create(path)?;

    let header: Vec<String> = times.iter().map(|t| format!("{t}")).collect();
    writeln!(file, "location,{}", header.join(",")).map_err(|e| write_err(path, e))?;

    for (loc, trace) in set.traces().iter().enumerate() {
        let row: Vec<String> = trace.values().iter().map(|v| format!("{v}")).collect();
        writeln!(file, "{loc},{}", row.join(",")).map_err(|e| write_err(path, e))?;
    }
    file.flush().map_err(|e| write_err(path, e))
}

/// Read a trace CSV written by [`write_signal_csv`] (or an external engine).
pub fn read_signal_csv(path: &Path) -> Result<(Vec<f64>, SignalSet), AppError> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|e| {
            AppError::io(format!("Failed to read CSV headers of '{}': {e}", path.display()))
        })?
        .clone();
    let times = parse_record(&headers, path, 1)?;

    let mut traces = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line_no = idx + 2;
        let record = record.map_err(|e| {
            AppError::io(format!("Failed to read '{}' line {line_no}: {e}", path.display()))
        })?;
        let values = parse_record(&record, path, line_no)?;
        if values.len() != times.len() {
            return Err(AppError::io(format!(
                "'{}' line {line_no}: {} values for {} time points.",
                path.display(),
                values.len(),
                times.len()
            )));
        }
        traces.push(SignalTrace::new(values));
    }
    Ok((times, SignalSet::new(traces)))
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

/// Parse every field after the leading label column.
fn parse_record(record: &StringRecord, path: &Path, line_no: usize) -> Result<Vec<f64>, AppError> {
    record
        .iter()
        .skip(1)
        .map(|cell| {
            cell.parse::<f64>().map_err(|e| {
                AppError::io(format!(
                    "'{}' line {line_no}: invalid number '{cell}': {e}",
                    path.display()
                ))
            })
        })
        .collect()
}

/// Write one scalar per location.
pub fn write_values_csv(path: &Path, name: &str, values: &[f64]) -> Result<(), AppError> {
    let mut file = create(path)?;
    writeln!(file, "location,{name}").map_err(|e| write_err(path, e))?;
    for (loc, v) in values.iter().enumerate() {
        writeln!(file, "{loc},{v}").map_err(|e| write_err(path, e))?;
    }
    file.flush().map_err(|e| write_err(path, e))
}

/// Read a value CSV written by [`write_values_csv`].
pub fn read_values_csv(path: &Path) -> Result<Vec<f64>, AppError> {
    let mut reader = open_csv(path)?;

    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line_no = idx + 2;
        let record = record.map_err(|e| {
            AppError::io(format!("Failed to read '{}' line {line_no}: {e}", path.display()))
        })?;
        match parse_record(&record, path, line_no)?.as_slice() {
            [v] => out.push(*v),
            _ => {
                return Err(AppError::io(format!(
                    "'{}' line {line_no}: expected exactly one value.",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}

/// Pretty-print any serializable value as JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::io(format!("Failed to write JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_csv_survives_a_write_read_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let set = SignalSet::new(vec![
            SignalTrace::new(vec![84.0, 80.5, -1.25]),
            SignalTrace::new(vec![0.0, 1.0, 2.0]),
        ]);
        write_signal_csv(&path, &[0.0, 0.1, 0.2], &set).unwrap();

        let (times, read) = read_signal_csv(&path).unwrap();
        assert_eq!(times, vec![0.0, 0.1, 0.2]);
        assert_eq!(read, set);
    }

    #[test]
    fn value_csv_reads_back_one_value_per_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean_ftiss.csv");
        write_values_csv(&path, "ftiss", &[60.0, 20.5]).unwrap();
        assert_eq!(read_values_csv(&path).unwrap(), vec![60.0, 20.5]);
    }

    #[test]
    fn quoted_cells_from_other_writers_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let trace_path = dir.path().join("modelfit.csv");
        std::fs::write(&trace_path, "\"location\",\"0\",\"0.1\"\n0, 1.0 ,\"2.0\"\n").unwrap();
        let (times, set) = read_signal_csv(&trace_path).unwrap();
        assert_eq!(times, vec![0.0, 0.1]);
        assert_eq!(set.get(0).unwrap().values(), &[1.0, 2.0]);

        let value_path = dir.path().join("mean_ftiss.csv");
        std::fs::write(&value_path, "location,ftiss\n0,\"60.0\"\n1,20.5\n").unwrap();
        assert_eq!(read_values_csv(&value_path).unwrap(), vec![60.0, 20.5]);
    }

    #[test]
    fn written_values_read_back_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_noisy.csv");
        let values = vec![84.0 + 1.0 / 3.0, -0.1 - 0.2, 1.234_567_890_123_456_7e-13];
        let set = SignalSet::single(SignalTrace::new(values.clone()));
        write_signal_csv(&path, &[0.0, 0.1, 0.2], &set).unwrap();

        let (_, read) = read_signal_csv(&path).unwrap();
        for (a, b) in read.get(0).unwrap().values().iter().zip(&values) {
            assert_eq!(a.to_bits(), b.to_bits());
        }

        let value_path = dir.path().join("mean_amp1.csv");
        write_values_csv(&value_path, "amp1", &values).unwrap();
        assert_eq!(read_values_csv(&value_path).unwrap(), values);
    }

    #[test]
    fn non_numeric_cells_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_values.csv");
        std::fs::write(&path, "location,ftiss\n0,abc\n").unwrap();
        let err = read_values_csv(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(err.message().contains("line 2"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "location,0,0.1\n0,1.0\n").unwrap();
        let err = read_signal_csv(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}

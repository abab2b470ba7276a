//! CSV rendering of bucket contents. Rendering is pure; the caller decides
//! where the bytes go.

use crate::error::{ReconError, Result};
use crate::model::{ClassifiedResult, ReconBucket, ReconResult};

/// File name of the duplicate-identifier report.
pub const DUPLICATES_FILE: &str = "duplicates.csv";

/// Placeholder for a missing volume number or an empty volume. Never an
/// identifier; readers of reviewed reports skip it.
pub const GAP: &str = "?";

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new().flexible(true).from_writer(Vec::new())
}

fn finish(w: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    w.into_inner().map_err(|e| ReconError::Report(e.to_string()))
}

fn row_err(e: csv::Error) -> ReconError {
    ReconError::Report(e.to_string())
}

fn header(bucket: ReconBucket) -> &'static [&'static str] {
    match bucket {
        ReconBucket::MalformedPair | ReconBucket::EquivalentForm | ReconBucket::Substitution => {
            &["record", "declared", "scanned", "note"]
        }
        ReconBucket::Malformed => &["record", "declared"],
        ReconBucket::NewIdentifier => &["record", "scanned", "note"],
        ReconBucket::MultiVolumeConsistent | ReconBucket::MultiVolumeReview => {
            &["record", "volume", "image_group", "declared", "scanned"]
        }
    }
}

/// Render one bucket as CSV with a header row. Multiple identifiers in a
/// cell are joined with `,`.
pub fn render(bucket: ReconBucket, result: &ReconResult) -> Result<Vec<u8>> {
    let mut w = writer();
    w.write_record(header(bucket)).map_err(row_err)?;

    for outcome in result.bucket(bucket) {
        if bucket.is_multi_volume() {
            write_volumes(&mut w, outcome)?;
            continue;
        }
        let declared = outcome.declared.join(",");
        let scanned = outcome.scanned.join(",");
        let note = outcome.note.as_deref().unwrap_or("");
        let key = outcome.record_key.as_str();
        let row: Vec<&str> = match bucket {
            ReconBucket::Malformed => vec![key, declared.as_str()],
            ReconBucket::NewIdentifier => vec![key, scanned.as_str(), note],
            _ => vec![key, declared.as_str(), scanned.as_str(), note],
        };
        w.write_record(&row).map_err(row_err)?;
    }

    finish(w)
}

/// One row per volume, then an all-empty separator row.
fn write_volumes(w: &mut csv::Writer<Vec<u8>>, outcome: &ClassifiedResult) -> Result<()> {
    let declared = outcome.declared.join(",");
    for v in &outcome.volumes {
        let volume = v.volume.map(|n| n.to_string()).unwrap_or_else(|| GAP.into());
        let scanned = if v.identifiers.is_empty() {
            GAP.to_string()
        } else {
            v.identifiers.join(",")
        };
        w.write_record([
            outcome.record_key.as_str(),
            volume.as_str(),
            v.image_group.as_str(),
            declared.as_str(),
            scanned.as_str(),
        ])
        .map_err(row_err)?;
    }
    w.write_record(["", "", "", "", ""]).map_err(row_err)?;
    Ok(())
}

/// Render the duplicate-identifier diagnostics as `identifier,records`.
pub fn render_duplicates(result: &ReconResult) -> Result<Vec<u8>> {
    let mut w = writer();
    w.write_record(["identifier", "records"]).map_err(row_err)?;
    for (id, records) in result.duplicates() {
        w.write_record([id, records.join(",").as_str()])
            .map_err(row_err)?;
    }
    finish(w)
}

/// Every bucket report, plus the duplicate report when the check ran.
pub fn render_all(result: &ReconResult) -> Result<Vec<(&'static str, Vec<u8>)>> {
    let mut files = Vec::with_capacity(ReconBucket::ALL.len() + 1);
    for bucket in ReconBucket::ALL {
        files.push((bucket.file_name(), render(bucket, result)?));
    }
    if result.summary.duplicate_identifiers.is_some() {
        files.push((DUPLICATES_FILE, render_duplicates(result)?));
    }
    Ok(files)
}

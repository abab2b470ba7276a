//! Parsing of pre-loaded input text: catalog CSV, mapping CSV, detection database.

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

use crate::error::{ReconError, Result};
use crate::identifier::split_field;
use crate::model::{CatalogEntry, Detection, DetectionDb, Image, ImageGroup, MappingRow, Work};

/// Key under an image group that holds the declared volume number.
const VOLUME_KEY: &str = "n";

fn reader(data: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes())
}

fn line_of(err: &csv::Error) -> u64 {
    err.position().map(|p| p.line()).unwrap_or(0)
}

/// Load `(record_key, identifier_field)` rows. The field is split on `,`/`;`
/// and each piece normalized. Rows with an empty key are skipped.
pub fn load_catalog(data: &str) -> Result<Vec<CatalogEntry>> {
    let mut entries = Vec::new();
    for record in reader(data).records() {
        let record = record.map_err(|e| ReconError::CatalogParse {
            line: line_of(&e),
            message: e.to_string(),
        })?;
        let key = record.get(0).unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        entries.push(CatalogEntry {
            record_key: key.to_string(),
            identifiers: split_field(record.get(1).unwrap_or("")),
        });
    }
    Ok(entries)
}

/// Load `(record_key, work_key, image_group_key, volume_index, title_index)` rows.
pub fn load_mapping(data: &str) -> Result<Vec<MappingRow>> {
    let mut rows = Vec::new();
    for record in reader(data).records() {
        let record = record.map_err(|e| ReconError::MappingParse {
            line: line_of(&e),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() < 3 {
            return Err(ReconError::MappingParse {
                line,
                message: format!("expected at least 3 fields, found {}", record.len()),
            });
        }

        let field = |i: usize| record.get(i).unwrap_or("").trim();
        rows.push(MappingRow {
            record_key: field(0).to_string(),
            work_key: field(1).to_string(),
            image_group_key: field(2).to_string(),
            volume_index: parse_index(field(3), "volume index", line),
            title_index: parse_index(field(4), "title index", line),
        });
    }
    Ok(rows)
}

fn parse_index(value: &str, what: &str, line: u64) -> Option<i64> {
    if value.is_empty() {
        return None;
    }
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(line, value, "mapping: unparsable {what}, ignored");
            None
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupEntry {
    Volume(i64),
    Detections(Vec<Detection>),
}

/// Load the nested detection database:
/// `work → image_group → { "n": volume, filename: [detection, ...] }`.
pub fn load_detection_db(data: &str) -> Result<DetectionDb> {
    let raw: IndexMap<String, IndexMap<String, IndexMap<String, GroupEntry>>> =
        serde_json::from_str(data).map_err(|e| ReconError::DetectionDbParse(e.to_string()))?;

    let works = raw
        .into_iter()
        .map(|(work_key, groups)| Work {
            image_groups: groups
                .into_iter()
                .map(|(group_key, entries)| build_group(&work_key, group_key, entries))
                .collect(),
            key: work_key,
        })
        .collect();

    Ok(DetectionDb { works })
}

fn build_group(work_key: &str, key: String, entries: IndexMap<String, GroupEntry>) -> ImageGroup {
    let mut volume_index = None;
    let mut images = Vec::new();
    for (name, entry) in entries {
        if name == VOLUME_KEY {
            match entry {
                GroupEntry::Volume(n) => volume_index = Some(n),
                GroupEntry::Detections(_) => {
                    warn!(work = work_key, image_group = %key, "volume entry is not a number, ignored");
                }
            }
            continue;
        }
        match entry {
            GroupEntry::Detections(detections) => images.push(Image {
                filename: name,
                detections,
            }),
            GroupEntry::Volume(_) => {
                warn!(work = work_key, image_group = %key, image = %name, "image entry is a number, ignored");
            }
        }
    }
    ImageGroup {
        key,
        volume_index,
        images,
    }
}

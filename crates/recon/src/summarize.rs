//! Merge reviewed bucket files back into per-record identifier tables.
//!
//! Reviewers edit the bucket CSVs by hand; this pass reads them back, folds
//! in whatever the scans found that the reviewed files do not already hold,
//! and fills the remaining records from the catalog. Two tables come out:
//! one row per record ("versions"), and one row per volume for records whose
//! volumes carry incompatible numbers ("outlines").

use std::collections::{BTreeMap, HashMap};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::aggregate::{select_best, DetectionRules};
use crate::config::{ReviewedSource, SummarizeConfig};
use crate::equivalence::keeps_all_compatible;
use crate::error::{ReconError, Result};
use crate::identifier::{guess_kind, normalize, IdKind};
use crate::model::{CatalogEntry, DetectionDb, MappingRow};
use crate::report::GAP;

/// Volume key used when an image group carries no volume number.
const UNKNOWN_VOLUME: &str = "-1";

/// Identifiers of one record or one volume, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSets {
    pub isbn: IndexSet<String>,
    pub issn: IndexSet<String>,
    pub ean: IndexSet<String>,
    /// Only populated per volume.
    pub volume_index: IndexSet<String>,
}

impl KindSets {
    fn get(&self, kind: IdKind) -> Option<&IndexSet<String>> {
        match kind {
            IdKind::Isbn => Some(&self.isbn),
            IdKind::Issn => Some(&self.issn),
            IdKind::Ean => Some(&self.ean),
            IdKind::VolumeIndex => Some(&self.volume_index),
            IdKind::Unknown => None,
        }
    }

    fn get_mut(&mut self, kind: IdKind) -> Option<&mut IndexSet<String>> {
        match kind {
            IdKind::Isbn => Some(&mut self.isbn),
            IdKind::Issn => Some(&mut self.issn),
            IdKind::Ean => Some(&mut self.ean),
            IdKind::VolumeIndex => Some(&mut self.volume_index),
            IdKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedEntry {
    pub ids: KindSets,
    /// Cleared the first time an identifier conflicts with one already held.
    pub volume_numbers_compatible: bool,
    /// Volume label → identifiers, in first-seen order.
    pub volumes: IndexMap<String, KindSets>,
}

impl Default for ReviewedEntry {
    fn default() -> Self {
        Self {
            ids: KindSets::default(),
            volume_numbers_compatible: true,
            volumes: IndexMap::new(),
        }
    }
}

impl ReviewedEntry {
    fn add_to_volume(&mut self, volume: &str, kind: IdKind, id: &str) {
        if let Some(set) = self
            .volumes
            .entry(volume.to_string())
            .or_default()
            .get_mut(kind)
        {
            set.insert(id.to_string());
        }
    }

    /// Reported per volume only when the volumes disagree.
    pub fn is_split(&self) -> bool {
        !self.volume_numbers_compatible && self.volumes.len() >= 2
    }
}

fn join(set: &IndexSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Record key → reviewed identifiers, iterated in key order.
#[derive(Debug, Default)]
pub struct ReviewedTable {
    record_prefix: String,
    pub entries: BTreeMap<String, ReviewedEntry>,
}

impl ReviewedTable {
    pub fn new(record_prefix: impl Into<String>) -> Self {
        Self {
            record_prefix: record_prefix.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read one reviewed CSV. The header row is skipped; rows whose first
    /// cell does not start with the record prefix are ignored, which drops
    /// the blank separator rows too. Gap placeholders are never identifiers,
    /// and a gap in the volume column files the row under the unknown volume.
    pub fn add_reviewed(&mut self, file: &str, data: &str, source: &ReviewedSource) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut rows = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| ReconError::ReviewedParse {
                file: file.to_string(),
                message: e.to_string(),
            })?;
            let key = record.get(0).unwrap_or("");
            if key.is_empty() || !key.starts_with(&self.record_prefix) {
                continue;
            }
            rows += 1;

            let volume = if source.multi_volume {
                record
                    .get(1)
                    .filter(|v| !v.is_empty())
                    .map(|v| if v == GAP { UNKNOWN_VOLUME } else { v })
            } else {
                None
            };
            let entry = self.entries.entry(key.to_string()).or_default();

            for &col in &source.columns {
                let Some(cell) = record.get(col).filter(|c| !c.is_empty()) else {
                    continue;
                };
                for piece in cell.split(',') {
                    let id = normalize(piece);
                    if id == GAP {
                        continue;
                    }
                    let mut kind = guess_kind(&id);
                    if kind == IdKind::Unknown {
                        continue;
                    }
                    if kind == IdKind::Ean && !source.allow_ean {
                        kind = IdKind::Isbn;
                    }

                    if kind != IdKind::VolumeIndex {
                        if let Some(set) = entry.ids.get_mut(kind) {
                            if entry.volume_numbers_compatible {
                                entry.volume_numbers_compatible = keeps_all_compatible(&id, set.iter());
                            }
                            set.insert(id.clone());
                        }
                    }
                    if let Some(v) = volume {
                        entry.add_to_volume(v, kind, &id);
                    }
                }
            }
        }

        debug!(file, rows, "reviewed file read");
        Ok(())
    }

    /// Fold scanned identifiers into records already present in the table.
    pub fn fold_detections(&mut self, db: &DetectionDb, mapping: &[MappingRow], rules: &DetectionRules) {
        let mut work_to_record: HashMap<&str, &str> = HashMap::new();
        let mut mapped_volume: HashMap<&str, i64> = HashMap::new();
        for row in mapping {
            work_to_record.insert(row.work_key.as_str(), row.record_key.as_str());
            if let Some(n) = row.volume_index {
                mapped_volume.insert(row.image_group_key.as_str(), n);
            }
        }

        for work in &db.works {
            let Some(record_key) = work_to_record.get(work.key.as_str()) else {
                continue;
            };
            let Some(entry) = self.entries.get_mut(*record_key) else {
                continue;
            };

            for group in &work.image_groups {
                let volume = group
                    .volume_index
                    .or_else(|| mapped_volume.get(group.key.as_str()).copied())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| UNKNOWN_VOLUME.to_string());

                for image in &group.images {
                    let Some(selection) = select_best(image, rules) else {
                        continue;
                    };
                    let id = selection.chosen;
                    let kind = guess_kind(&id);
                    if matches!(kind, IdKind::VolumeIndex | IdKind::Unknown) {
                        continue;
                    }
                    if entry.ids.get(kind).is_some_and(|set| set.contains(&id)) {
                        continue;
                    }
                    if let Some(set) = entry.ids.get_mut(kind) {
                        set.insert(id.clone());
                    }
                    if !entry.volume_numbers_compatible {
                        entry.add_to_volume(&volume, kind, &id);
                    }
                }
            }
        }
    }

    /// Add catalog records the reviewed files never mentioned.
    pub fn add_catalog(&mut self, catalog: &[CatalogEntry]) {
        for row in catalog {
            if self.entries.contains_key(&row.record_key) {
                continue;
            }
            let mut entry = ReviewedEntry::default();
            for id in &row.identifiers {
                let kind = guess_kind(id);
                if kind == IdKind::VolumeIndex {
                    continue;
                }
                if let Some(set) = entry.ids.get_mut(kind) {
                    set.insert(id.clone());
                }
            }
            self.entries.insert(row.record_key.clone(), entry);
        }
    }

    /// `(record, isbns, issns, eans)`; split records get empty cells.
    pub fn versions_rows(&self) -> Vec<[String; 4]> {
        self.entries
            .iter()
            .map(|(key, e)| {
                if e.is_split() {
                    [key.clone(), String::new(), String::new(), String::new()]
                } else {
                    [key.clone(), join(&e.ids.isbn), join(&e.ids.issn), join(&e.ids.ean)]
                }
            })
            .collect()
    }

    /// `(record, volume, isbns, issns, eans, volume indices)` for split records.
    pub fn outlines_rows(&self) -> Vec<[String; 6]> {
        let mut rows = Vec::new();
        for (key, e) in &self.entries {
            if !e.is_split() {
                continue;
            }
            for (volume, ids) in &e.volumes {
                rows.push([
                    key.clone(),
                    volume.clone(),
                    join(&ids.isbn),
                    join(&ids.issn),
                    join(&ids.ean),
                    join(&ids.volume_index),
                ]);
            }
        }
        rows
    }
}

fn render_rows<const N: usize>(rows: &[[String; N]]) -> Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        w.write_record(row)
            .map_err(|e| ReconError::Report(e.to_string()))?;
    }
    w.into_inner().map_err(|e| ReconError::Report(e.to_string()))
}

/// Pre-loaded inputs for a summarize pass. `reviewed` pairs each configured
/// source with its file contents, in configuration order.
pub struct SummarizeInput<'a> {
    pub catalog: Vec<CatalogEntry>,
    pub mapping: Vec<MappingRow>,
    pub detections: DetectionDb,
    pub reviewed: Vec<(&'a ReviewedSource, String)>,
}

#[derive(Debug, Clone)]
pub struct SummarizeOutput {
    pub records: usize,
    pub split_records: usize,
    pub versions: Vec<u8>,
    pub outlines: Vec<u8>,
}

/// Build both tables from reviewed files, detections and the catalog.
pub fn summarize(
    config: &SummarizeConfig,
    rules: &DetectionRules,
    input: &SummarizeInput<'_>,
) -> Result<SummarizeOutput> {
    let mut table = ReviewedTable::new(&config.record_prefix);
    for (source, data) in &input.reviewed {
        table.add_reviewed(&source.file, data, source)?;
    }
    info!(records = table.entries.len(), "reviewed files merged");

    table.fold_detections(&input.detections, &input.mapping, rules);
    table.add_catalog(&input.catalog);

    let split_records = table.entries.values().filter(|e| e.is_split()).count();
    Ok(SummarizeOutput {
        records: table.entries.len(),
        split_records,
        versions: render_rows(&table.versions_rows())?,
        outlines: render_rows(&table.outlines_rows())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Detection, Image, ImageGroup, Work};

    fn source(columns: &[usize], multi_volume: bool, allow_ean: bool) -> ReviewedSource {
        ReviewedSource {
            file: "reviewed.csv".into(),
            columns: columns.to_vec(),
            multi_volume,
            allow_ean,
        }
    }

    #[test]
    fn reads_prefixed_rows_after_header() {
        let mut table = ReviewedTable::new("MW");
        let data = "record,declared,scanned\nMW1,x,\"978-0-306-40615-7, 0306406152\"\nW22,x,9781234567897\n";
        table
            .add_reviewed("s.csv", data, &source(&[2], false, true))
            .unwrap();
        assert_eq!(table.entries.len(), 1);
        let e = &table.entries["MW1"];
        assert_eq!(
            e.ids.isbn.iter().collect::<Vec<_>>(),
            vec!["9780306406157", "0306406152"]
        );
        assert!(e.volume_numbers_compatible);
    }

    #[test]
    fn ean_counts_as_isbn_when_not_allowed() {
        let mut table = ReviewedTable::new("MW");
        table
            .add_reviewed("s.csv", "h\nMW1,,6901234567892\n", &source(&[2], false, false))
            .unwrap();
        assert!(table.entries["MW1"].ids.isbn.contains("6901234567892"));
        assert!(table.entries["MW1"].ids.ean.is_empty());
    }

    #[test]
    fn conflicting_volumes_are_split() {
        let mut table = ReviewedTable::new("MW");
        let data = "record,volume,image_group,declared,scanned\n\
                    MW1,1,I1,,9780306406157\n\
                    MW1,2,I2,,9781234567897\n\
                    MW1,3,I3,,03\n";
        table
            .add_reviewed("m.csv", data, &source(&[4], true, true))
            .unwrap();
        let e = &table.entries["MW1"];
        assert!(!e.volume_numbers_compatible);
        assert!(e.is_split());
        assert!(e.volumes["3"].volume_index.contains("03"));

        let versions = table.versions_rows();
        assert_eq!(versions[0][1], "");
        let outlines = table.outlines_rows();
        assert_eq!(outlines.len(), 3);
        assert_eq!(outlines[0][1], "1");
        assert_eq!(outlines[0][2], "9780306406157");
        assert_eq!(outlines[2][5], "03");
    }

    #[test]
    fn review_report_gaps_and_separators_are_not_identifiers() {
        use crate::model::{ClassifiedResult, ReconBucket, ReconMeta, ReconResult, RunSummary, VolumeRow};
        use crate::report::render;

        let volume = |n: Option<i64>, group: &str, ids: &[&str]| VolumeRow {
            volume: n,
            image_group: group.into(),
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
        };
        let outcome = |key: &str, volumes: Vec<VolumeRow>| ClassifiedResult {
            bucket: ReconBucket::MultiVolumeReview,
            record_key: key.into(),
            declared: vec!["0000000000".into()],
            scanned: vec![],
            note: None,
            coverage: None,
            volumes,
        };
        let result = ReconResult {
            meta: ReconMeta {
                config_name: "test".into(),
                engine_version: "0.0.0".into(),
                run_at: "2026-01-01T00:00:00+00:00".into(),
            },
            summary: RunSummary::default(),
            outcomes: vec![
                outcome(
                    "MW1",
                    vec![
                        volume(Some(1), "I1", &["9780306406157"]),
                        volume(Some(2), "I2", &[]),
                        volume(Some(3), "I3", &["9781234567897"]),
                    ],
                ),
                outcome(
                    "MW2",
                    vec![
                        volume(Some(1), "I4", &["9780306406157"]),
                        volume(None, "I5", &["0306406152"]),
                    ],
                ),
            ],
            diagnostics: vec![],
        };
        let data = String::from_utf8(render(ReconBucket::MultiVolumeReview, &result).unwrap()).unwrap();
        assert!(data.contains(",?\n"));
        assert!(data.contains("\n,,,,\n"));

        let mut table = ReviewedTable::new("MW");
        table
            .add_reviewed("multi-volume-review.csv", &data, &source(&[4], true, true))
            .unwrap();
        assert_eq!(table.entries.len(), 2);

        let e = &table.entries["MW1"];
        assert_eq!(
            e.ids.isbn.iter().collect::<Vec<_>>(),
            vec!["9780306406157", "9781234567897"]
        );
        assert!(e.is_split());
        assert!(!e.volumes.contains_key("2"));

        // the unnumbered volume files under the unknown label, and its
        // ISBN-10 still agrees with volume 1
        let e = &table.entries["MW2"];
        assert!(e.volume_numbers_compatible);
        assert!(e.volumes.contains_key(UNKNOWN_VOLUME));
        assert!(!e.volumes.contains_key(GAP));

        assert_eq!(
            table.outlines_rows(),
            vec![
                ["MW1", "1", "9780306406157", "", "", ""].map(String::from),
                ["MW1", "3", "9781234567897", "", "", ""].map(String::from),
            ]
        );
    }

    #[test]
    fn detection_fold_only_touches_reviewed_records() {
        let mut table = ReviewedTable::new("MW");
        table
            .add_reviewed("s.csv", "h\nMW1,,0306406152\n", &source(&[2], false, true))
            .unwrap();

        let db = DetectionDb {
            works: vec![
                Work {
                    key: "W1".into(),
                    image_groups: vec![ImageGroup {
                        key: "I1".into(),
                        volume_index: None,
                        images: vec![Image {
                            filename: "a.tif".into(),
                            detections: vec![Detection {
                                symbology: "EAN13".into(),
                                data: Some("9780306406157".into()),
                                rect: None,
                            }],
                        }],
                    }],
                },
                Work {
                    key: "W2".into(),
                    image_groups: vec![],
                },
            ],
        };
        let mapping = vec![
            MappingRow {
                record_key: "MW1".into(),
                work_key: "W1".into(),
                image_group_key: "I1".into(),
                volume_index: None,
                title_index: None,
            },
            MappingRow {
                record_key: "MW2".into(),
                work_key: "W2".into(),
                image_group_key: "I2".into(),
                volume_index: None,
                title_index: None,
            },
        ];
        table.fold_detections(&db, &mapping, &DetectionRules::default());

        assert_eq!(table.entries.len(), 1);
        let e = &table.entries["MW1"];
        assert!(e.ids.isbn.contains("9780306406157"));
        // compatible record: nothing recorded per volume
        assert!(e.volumes.is_empty());
    }

    #[test]
    fn catalog_fills_missing_records() {
        let mut table = ReviewedTable::new("MW");
        table.add_catalog(&[CatalogEntry {
            record_key: "MW5".into(),
            identifiers: vec!["12345679".into(), "02".into(), "9770000000001".into()],
        }]);
        let e = &table.entries["MW5"];
        assert!(e.ids.issn.contains("12345679"));
        assert!(e.ids.issn.contains("9770000000001"));
        assert!(e.ids.volume_index.is_empty());
    }

    #[test]
    fn summarize_renders_both_tables() {
        let config = SummarizeConfig {
            record_prefix: "MW".into(),
            versions: "v.csv".into(),
            outlines: "o.csv".into(),
            sources: vec![],
        };
        let input = SummarizeInput {
            catalog: vec![
                CatalogEntry {
                    record_key: "MW2".into(),
                    identifiers: vec!["0306406152".into(), "9780306406157".into()],
                },
                CatalogEntry {
                    record_key: "MW1".into(),
                    identifiers: vec![],
                },
            ],
            mapping: vec![],
            detections: DetectionDb::default(),
            reviewed: vec![],
        };
        let out = summarize(&config, &DetectionRules::default(), &input).unwrap();
        assert_eq!(out.records, 2);
        assert_eq!(out.split_records, 0);
        assert_eq!(
            String::from_utf8(out.versions).unwrap(),
            "MW1,,,\nMW2,\"0306406152,9780306406157\",,\n"
        );
        assert!(out.outlines.is_empty());
    }
}

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::ReconConfig;
use crate::identifier::{normalize, Identifier};
use crate::model::{CatalogEntry, CatalogRecord, DetectionDb, Diagnostic, Image, MappingRow};
use crate::validate::well_formed_with;

/// Detection filtering and per-image tie-break settings.
#[derive(Debug, Clone)]
pub struct DetectionRules {
    pub symbologies: Vec<String>,
    pub preferred_prefixes: Vec<String>,
    pub legacy_short_form: bool,
}

impl DetectionRules {
    pub fn from_config(config: &ReconConfig) -> Self {
        Self {
            symbologies: config.detection.symbologies.clone(),
            preferred_prefixes: config.detection.preferred_prefixes.clone(),
            legacy_short_form: config.validation.legacy_short_form,
        }
    }

    fn accepts(&self, symbology: &str) -> bool {
        self.symbologies.iter().any(|s| s == symbology)
    }

    fn qualifies(&self, data: &str) -> bool {
        well_formed_with(data, self.legacy_short_form)
            && self.preferred_prefixes.iter().any(|p| data.starts_with(p.as_str()))
    }
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            symbologies: vec!["EAN13".into()],
            preferred_prefixes: vec!["978".into(), "979".into(), "977".into()],
            legacy_short_form: true,
        }
    }
}

/// The identifier picked for one image, plus any other qualifying values seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub chosen: String,
    pub others: Vec<String>,
}

/// Pick at most one identifier for an image.
///
/// Among detections of an accepted symbology, the first that is well-formed
/// and carries a preferred prefix wins; otherwise the first candidate seen,
/// malformed or not, so that it still reaches review.
pub fn select_best(image: &Image, rules: &DetectionRules) -> Option<Selection> {
    let candidates: Vec<String> = image
        .detections
        .iter()
        .filter(|d| rules.accepts(&d.symbology))
        .filter_map(|d| d.data.as_deref())
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect();

    let mut qualifying = candidates.iter().filter(|c| rules.qualifies(c));
    match qualifying.next() {
        Some(first) => {
            let mut others: Vec<String> = Vec::new();
            for c in qualifying {
                if c != first && !others.contains(c) {
                    others.push(c.clone());
                }
            }
            Some(Selection {
                chosen: first.clone(),
                others,
            })
        }
        None => candidates.first().map(|c| Selection {
            chosen: c.clone(),
            others: Vec::new(),
        }),
    }
}

/// Counters gathered while folding the detection database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub images_with_detections: usize,
    pub ambiguous_images: usize,
    pub works_without_record: usize,
}

/// All per-run accumulator state. Owned by the orchestrating pass; records
/// are keyed by record key so every later pass runs in key order.
#[derive(Debug, Default)]
pub struct ReconciliationContext {
    pub records: BTreeMap<String, CatalogRecord>,
    pub stats: FoldStats,
    pub diagnostics: Vec<Diagnostic>,
    work_to_record: HashMap<String, String>,
    rules: DetectionRules,
}

impl ReconciliationContext {
    pub fn new(rules: DetectionRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Seed declared identifiers. Repeated keys merge.
    pub fn load_catalog(&mut self, entries: &[CatalogEntry]) {
        for entry in entries {
            let record = self
                .records
                .entry(entry.record_key.clone())
                .or_insert_with(|| CatalogRecord::new(&entry.record_key));
            for raw in &entry.identifiers {
                record.declared.insert(Identifier::from_normalized(raw.clone()));
            }
        }
    }

    /// Register the work → record lookup and any declared volume numbers.
    /// Records the catalog does not know are created with nothing declared.
    pub fn register_mapping(&mut self, rows: &[MappingRow]) {
        for row in rows {
            if row.record_key.is_empty() || row.work_key.is_empty() {
                continue;
            }
            self.work_to_record
                .insert(row.work_key.clone(), row.record_key.clone());
            let record = self
                .records
                .entry(row.record_key.clone())
                .or_insert_with(|| CatalogRecord::new(&row.record_key));
            if let Some(n) = row.volume_index {
                record.volume_order.insert(row.image_group_key.clone(), n);
            }
        }
    }

    /// Fold every work's detections into its record. Folding the same
    /// database again leaves the identifier sets unchanged.
    pub fn fold_detections(&mut self, db: &DetectionDb) {
        for work in &db.works {
            let Some(record_key) = self.work_to_record.get(&work.key).cloned() else {
                warn!(work = %work.key, "work has no catalog record, skipped");
                self.stats.works_without_record += 1;
                self.diagnostics.push(Diagnostic::WorkWithoutRecord {
                    work: work.key.clone(),
                });
                continue;
            };

            let Some(record) = self.records.get_mut(&record_key) else {
                continue;
            };

            for group in &work.image_groups {
                if let Some(n) = group.volume_index {
                    record.volume_order.insert(group.key.clone(), n);
                }

                for image in &group.images {
                    let Some(selection) = select_best(image, &self.rules) else {
                        continue;
                    };
                    self.stats.images_with_detections += 1;

                    if !selection.others.is_empty() {
                        debug!(
                            work = %work.key,
                            image_group = %group.key,
                            image = %image.filename,
                            chosen = %selection.chosen,
                            others = ?selection.others,
                            "two different identifiers on one image"
                        );
                        self.stats.ambiguous_images += 1;
                        self.diagnostics.push(Diagnostic::AmbiguousImage {
                            work: work.key.clone(),
                            image_group: group.key.clone(),
                            image: image.filename.clone(),
                            chosen: selection.chosen.clone(),
                            others: selection.others.clone(),
                        });
                    }

                    let id = Identifier::from_normalized(selection.chosen);
                    record.scanned.insert(id.clone());
                    record
                        .per_volume
                        .entry(group.key.clone())
                        .or_default()
                        .insert(id);
                }
            }
        }
    }
}

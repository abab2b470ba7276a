use tracing::info;

use crate::aggregate::{DetectionRules, ReconciliationContext};
use crate::classify::classify_record;
use crate::config::ReconConfig;
use crate::duplicates::find_duplicates;
use crate::error::ReconError;
use crate::evidence::{compute_summary, VerdictTally};
use crate::model::{Diagnostic, ReconInput, ReconMeta, ReconResult, Verdict};
use crate::source::{load_catalog, load_detection_db, load_mapping};

/// Per-run switches that may override the config.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run the cross-record duplicate check even if the config leaves it off.
    pub check_duplicates: bool,
}

/// Run reconciliation per config. Returns classified results + summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    run_with(config, input, RunOptions::default())
}

pub fn run_with(
    config: &ReconConfig,
    input: &ReconInput,
    options: RunOptions,
) -> Result<ReconResult, ReconError> {
    let rules = DetectionRules::from_config(config);
    let legacy_short_form = rules.legacy_short_form;

    let mut ctx = ReconciliationContext::new(rules);
    ctx.load_catalog(&input.catalog);
    ctx.register_mapping(&input.mapping);
    ctx.fold_detections(&input.detections);
    info!(
        records = ctx.records.len(),
        images = ctx.stats.images_with_detections,
        "detections folded"
    );

    let mut outcomes = Vec::new();
    let mut tally = VerdictTally::default();
    let mut diagnostics = std::mem::take(&mut ctx.diagnostics);

    for record in ctx.records.values() {
        let verdict = classify_record(record, legacy_short_form);
        tally.record(&verdict);
        match verdict {
            Verdict::Reported(result) => outcomes.push(result),
            Verdict::Unclassified => diagnostics.push(Diagnostic::Unclassified {
                record_key: record.key.clone(),
                declared: record.declared.len(),
                scanned: record.scanned.len(),
            }),
            Verdict::Confirmed { .. } | Verdict::DeclaredOnly | Verdict::Empty => {}
        }
    }

    let duplicate_identifiers = if config.duplicates.enabled || options.check_duplicates {
        let dups = find_duplicates(&ctx.records);
        let count = dups.len();
        diagnostics.extend(dups);
        Some(count)
    } else {
        None
    };

    let summary = compute_summary(
        &ctx.records,
        &outcomes,
        &tally,
        &ctx.stats,
        duplicate_identifiers,
    );
    info!(
        records = summary.total_records,
        reported = outcomes.len(),
        needs_review = summary.needs_review,
        "classification complete"
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        outcomes,
        diagnostics,
    })
}

/// Parse the three input texts into a [`ReconInput`].
pub fn load_input(catalog: &str, mapping: &str, detections: &str) -> Result<ReconInput, ReconError> {
    Ok(ReconInput {
        catalog: load_catalog(catalog)?,
        mapping: load_mapping(mapping)?,
        detections: load_detection_db(detections)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReconBucket;

    fn config(duplicates: bool) -> ReconConfig {
        let toml = format!(
            r#"
name = "engine-test"

[inputs]
catalog = "c.csv"
mapping = "m.csv"
detections = "db.json"

[duplicates]
enabled = {duplicates}
"#
        );
        ReconConfig::from_toml(&toml).unwrap()
    }

    const CATALOG: &str = "\
MW1,0306406152
MW2,9780306406157
MW3,81189(pbk.)
MW4,
MW5,9781234567897
MW6,
";

    const MAPPING: &str = "\
MW1,W1,I11,,0
MW2,W2,I21,,0
MW4,W4,I41,,0
MW6,W6,I61,1,0
MW6,W6,I62,2,0
";

    const DB: &str = r#"{
        "W1": {"I11": {"a.tif": [{"t": "EAN13", "d": "9780306406157"}]}},
        "W2": {"I21": {"a.tif": [{"t": "EAN13", "d": "9780306406157"}]}},
        "W4": {"I41": {"a.tif": [{"t": "EAN13", "d": "9781234567897"}]}},
        "W6": {
            "I61": {"n": 1, "a.tif": [{"t": "EAN13", "d": "9780306406157"}]},
            "I62": {"n": 2, "a.tif": [{"t": "EAN13", "d": "9781234567897"}]}
        },
        "W9": {"I91": {"a.tif": []}}
    }"#;

    fn input() -> ReconInput {
        load_input(CATALOG, MAPPING, DB).unwrap()
    }

    #[test]
    fn run_classifies_every_record() {
        let result = run(&config(false), &input()).unwrap();
        let s = &result.summary;

        assert_eq!(s.total_records, 6);
        assert_eq!(s.confirmed, 1); // MW2
        assert_eq!(s.declared_only, 1); // MW5
        assert_eq!(s.works_without_record, 1); // W9
        assert_eq!(s.bucket_counts["equivalent_form"], 1); // MW1
        assert_eq!(s.bucket_counts["malformed"], 1); // MW3
        assert_eq!(s.bucket_counts["new_identifier"], 1); // MW4
        assert_eq!(s.bucket_counts["multi_volume_consistent"], 1); // MW6
        assert_eq!(s.duplicate_identifiers, None);

        let keys: Vec<&str> = result.outcomes.iter().map(|o| o.record_key.as_str()).collect();
        assert_eq!(keys, vec!["MW1", "MW3", "MW4", "MW6"]);
        assert_eq!(result.meta.config_name, "engine-test");
    }

    #[test]
    fn every_record_reaches_at_most_one_bucket() {
        let result = run(&config(false), &input()).unwrap();
        let mut keys: Vec<&str> = result.outcomes.iter().map(|o| o.record_key.as_str()).collect();
        let before = keys.len();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn duplicate_check_from_config_or_option() {
        let off = run(&config(false), &input()).unwrap();
        assert!(off.duplicates().next().is_none());

        let on = run(&config(true), &input()).unwrap();
        let forced = run_with(
            &config(false),
            &input(),
            RunOptions {
                check_duplicates: true,
            },
        )
        .unwrap();

        for result in [&on, &forced] {
            let dups: Vec<_> = result.duplicates().collect();
            // 9780306406157 under MW1, MW2, MW6; 9781234567897 under MW4, MW5, MW6
            assert_eq!(dups.len(), 2);
            assert_eq!(dups[0].0, "9780306406157");
            assert_eq!(dups[0].1, ["MW1", "MW2", "MW6"]);
            assert_eq!(result.summary.duplicate_identifiers, Some(2));
        }
    }

    #[test]
    fn outcomes_are_deterministic() {
        let a = run(&config(true), &input()).unwrap();
        let b = run(&config(true), &input()).unwrap();
        assert_eq!(a.outcomes, b.outcomes);
        assert_eq!(a.diagnostics, b.diagnostics);
        assert_eq!(a.summary, b.summary);
        assert_eq!(
            a.bucket(ReconBucket::MultiVolumeConsistent)[0].volumes.len(),
            2
        );
    }
}

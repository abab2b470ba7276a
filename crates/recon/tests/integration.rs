use std::path::PathBuf;

use coverscan_recon::aggregate::DetectionRules;
use coverscan_recon::config::ReconConfig;
use coverscan_recon::engine::{load_input, run, run_with, RunOptions};
use coverscan_recon::model::{Diagnostic, ReconBucket, ReconResult};
use coverscan_recon::report::{render, render_all};
use coverscan_recon::summarize::{summarize, SummarizeInput};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn config() -> ReconConfig {
    ReconConfig::from_toml(&read("review.toml")).unwrap()
}

fn load_and_run(options: RunOptions) -> ReconResult {
    let config = config();
    let input = load_input(
        &read(&config.inputs.catalog),
        &read(&config.inputs.mapping),
        &read(&config.inputs.detections),
    )
    .unwrap();
    run_with(&config, &input, options).unwrap()
}

fn only(result: &ReconResult, bucket: ReconBucket) -> &coverscan_recon::model::ClassifiedResult {
    let rows = result.bucket(bucket);
    assert_eq!(rows.len(), 1, "expected one {bucket} outcome");
    rows[0]
}

// -------------------------------------------------------------------------
// Run
// -------------------------------------------------------------------------

#[test]
fn fixture_run_summary() {
    let result = load_and_run(RunOptions::default());
    let s = &result.summary;

    assert_eq!(result.meta.config_name, "isbn-review");
    assert_eq!(s.total_records, 8);
    assert_eq!(s.confirmed, 0);
    assert_eq!(s.declared_only, 1);
    assert_eq!(s.unclassified, 0);
    assert_eq!(s.empty_records, 0);
    assert_eq!(s.needs_review, 4);
    assert_eq!(s.volumes_found, 10);
    assert_eq!(s.volumes_missing, 1);
    assert_eq!(s.images_with_detections, 10);
    assert_eq!(s.ambiguous_images, 1);
    assert_eq!(s.works_without_record, 1);
    assert_eq!(s.duplicate_identifiers, None);
    for bucket in ReconBucket::ALL {
        assert_eq!(s.bucket_counts[&bucket.to_string()], 1, "{bucket}");
    }
}

#[test]
fn isbn10_declared_isbn13_scanned_is_equivalent_form() {
    let result = load_and_run(RunOptions::default());
    let row = only(&result, ReconBucket::EquivalentForm);
    assert_eq!(row.record_key, "MW100");
    assert_eq!(row.declared, vec!["0306406152"]);
    assert_eq!(row.scanned, vec!["9780306406157"]);
    assert_eq!(row.note, None);
}

#[test]
fn three_volumes_collapse_to_new_identifier() {
    let result = load_and_run(RunOptions::default());
    let row = only(&result, ReconBucket::NewIdentifier);
    assert_eq!(row.record_key, "MW200");
    assert_eq!(row.scanned, vec!["9781234567897"]);
    assert_eq!(row.note.as_deref(), Some("found on all 3 volumes"));
    assert!(result
        .bucket(ReconBucket::MultiVolumeReview)
        .iter()
        .all(|r| r.record_key != "MW200"));
}

#[test]
fn malformed_pair_notes_bad_scan() {
    let result = load_and_run(RunOptions::default());
    let row = only(&result, ReconBucket::MalformedPair);
    assert_eq!(row.record_key, "MW400");
    assert_eq!(row.scanned, vec!["978818916527"]);
    assert_eq!(row.note.as_deref(), Some("scanned identifier is not a valid ISBN-13"));
}

#[test]
fn partial_coverage_keeps_gap_visible() {
    let result = load_and_run(RunOptions::default());
    let row = only(&result, ReconBucket::MultiVolumeConsistent);
    assert_eq!(row.record_key, "MW600");
    assert_eq!(row.note.as_deref(), Some("found on 2/3 volumes (1, 2)"));

    let text = String::from_utf8(render(ReconBucket::MultiVolumeConsistent, &result).unwrap()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[3], "MW600,3,I6003,\"9780000000002,9781111111113\",?");
    assert_eq!(lines[4], ",,,,");
}

#[test]
fn conflicting_volumes_need_review() {
    let result = load_and_run(RunOptions::default());
    let row = only(&result, ReconBucket::MultiVolumeReview);
    assert_eq!(row.record_key, "MW700");
    assert_eq!(row.scanned, vec!["9780306406157", "9791032305690"]);
    assert_eq!(row.volumes.len(), 2);
}

#[test]
fn diagnostics_name_ambiguous_image_and_stray_work() {
    let result = load_and_run(RunOptions::default());
    assert!(result.diagnostics.contains(&Diagnostic::AmbiguousImage {
        work: "W100".into(),
        image_group: "I1001".into(),
        image: "I10010001.tif".into(),
        chosen: "9780306406157".into(),
        others: vec!["9783161484100".into()],
    }));
    assert!(result
        .diagnostics
        .contains(&Diagnostic::WorkWithoutRecord { work: "W999".into() }));
}

#[test]
fn duplicate_check_on_request() {
    let result = load_and_run(RunOptions {
        check_duplicates: true,
    });
    let dups: Vec<(&str, Vec<String>)> = result
        .duplicates()
        .map(|(id, recs)| (id, recs.to_vec()))
        .collect();
    assert_eq!(
        dups,
        vec![
            ("9780306406157", vec!["MW100".to_string(), "MW700".to_string()]),
            ("9791032305690", vec!["MW300".to_string(), "MW700".to_string()]),
        ]
    );
    assert_eq!(result.summary.duplicate_identifiers, Some(2));
}

#[test]
fn reports_are_byte_identical_across_runs() {
    let a = render_all(&load_and_run(RunOptions::default())).unwrap();
    let b = render_all(&load_and_run(RunOptions::default())).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 7);
}

#[test]
fn json_summary_shape() {
    let result = load_and_run(RunOptions::default());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["summary"]["total_records"], 8);
    assert_eq!(json["outcomes"][0]["bucket"], "equivalent_form");
    assert!(json["summary"].get("duplicate_identifiers").is_none());
    assert_eq!(json["diagnostics"][0]["kind"], "ambiguous_image");
}

// -------------------------------------------------------------------------
// Summarize
// -------------------------------------------------------------------------

#[test]
fn reviewed_reports_merge_back() {
    let config = config();
    let result = run(&config, &load_input(
        &read(&config.inputs.catalog),
        &read(&config.inputs.mapping),
        &read(&config.inputs.detections),
    )
    .unwrap())
    .unwrap();

    // Reviewers accept the reports unchanged.
    let reports = render_all(&result).unwrap();
    let summarize_config = config.summarize.clone().unwrap();
    let reviewed = summarize_config
        .sources
        .iter()
        .map(|source| {
            let (_, bytes) = reports
                .iter()
                .find(|(name, _)| *name == source.file)
                .unwrap();
            (source, String::from_utf8(bytes.clone()).unwrap())
        })
        .collect();

    let input = SummarizeInput {
        catalog: coverscan_recon::source::load_catalog(&read("catalog.csv")).unwrap(),
        mapping: coverscan_recon::source::load_mapping(&read("mapping.csv")).unwrap(),
        detections: coverscan_recon::source::load_detection_db(&read("db.json")).unwrap(),
        reviewed,
    };
    let out = summarize(&summarize_config, &DetectionRules::from_config(&config), &input).unwrap();

    assert_eq!(out.records, 8);
    assert_eq!(out.split_records, 1);

    let versions = String::from_utf8(out.versions).unwrap();
    let lines: Vec<&str> = versions.lines().collect();
    assert_eq!(lines[0], "MW100,0306406152,,");
    assert_eq!(lines[2], "MW300,9791032305690,,");
    assert_eq!(lines[6], "MW700,,,");

    let outlines = String::from_utf8(out.outlines).unwrap();
    assert_eq!(
        outlines,
        "MW700,1,9780306406157,,,\nMW700,2,9791032305690,,,\n"
    );
}

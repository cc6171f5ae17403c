use std::collections::HashMap;
use std::path::Path;

use chrono::TimeZone;
use clap::Parser;
use report_core::change::Classification;
use report_core::models::CountPair;
use report_core::settings::Settings;
use report_runtime::jobs::{run, Providers, ReportOutput, TrafficRun};
use report_runtime::providers::{FirstCandidate, StaticValues};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn run_traffic(dir: &Path, extra: &[&str], special: &mut StaticValues) -> TrafficRun {
    let mut args = vec![
        "payreport".to_string(),
        "--report".to_string(),
        "traffic".to_string(),
        "--dir".to_string(),
        dir.display().to_string(),
        "--profile".to_string(),
        dir.join("profile.json").display().to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    let settings = Settings::parse_from(args);

    let now = chrono_tz::Europe::Moscow
        .with_ymd_and_hms(2026, 1, 13, 12, 0, 0)
        .unwrap();
    let providers = Providers {
        columns: &mut FirstCandidate,
        special_values: special,
    };
    match run(&settings, providers, now).unwrap() {
        ReportOutput::Traffic(run) => run,
        other => panic!("unexpected output: {other:?}"),
    }
}

fn subjects<'a>(records: impl Iterator<Item = &'a report_core::change::ChangeRecord>) -> Vec<String> {
    records.map(|r| r.subject.clone()).collect()
}

#[test]
fn test_traffic_report_across_files() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "aggregated_data.csv",
        "ID,Merchant,Baseline,Current\n\
         101,Acme,60,90\n\
         102,Beta,0,10\n",
    );
    write(
        tmp.path(),
        "report_19_00_00.csv",
        "ID;Merchant;Baseline;Current\n\
         101;Acme;40;60\n\
         103;Gamma;40;0\n\
         104;Delta;20;21\n",
    );
    write(tmp.path(), "notes.csv", "just text\n");
    write(
        tmp.path(),
        "profile.json",
        r#"{"special_accounts": [{"name": "Solo"}]}"#,
    );
    let mut special = StaticValues::new(HashMap::from([(
        "Solo".to_string(),
        CountPair::new(10, 10),
    )]));

    let run = run_traffic(tmp.path(), &[], &mut special);

    assert_eq!(run.files.len(), 2);
    assert_eq!(run.skipped.len(), 1);
    assert_eq!(run.skipped[0].file, "notes.csv");

    let report = &run.report;
    assert_eq!(
        subjects(report.threshold.significant.increasing.iter()),
        vec!["102 Beta", "101 Acme"]
    );
    assert_eq!(
        subjects(report.threshold.significant.decreasing.iter()),
        vec!["103 Gamma"]
    );
    assert!(report.threshold.significant.unchanged.is_empty());

    let acme = &report.threshold.significant.increasing[1];
    assert_eq!((acme.baseline, acme.current), (100, 150));
    assert_eq!(acme.classification, Classification::Increase);
    assert_eq!(acme.description(), "+50.00% (100 → 150)");
    assert_eq!(
        report.threshold.significant.decreasing[0].description(),
        "-100.00% (closed) (40 → 0)"
    );

    // Delta is below the growth threshold but stays in the dump.
    assert_eq!(
        subjects(report.dump.increasing.iter()),
        vec!["102 Beta", "101 Acme", "104 Delta"]
    );
    assert_eq!(report.dump.increasing[2].description(), "+5.00% (20 → 21)");
    assert_eq!(subjects(report.dump.unchanged.iter()), vec!["Solo"]);
    assert!(report.is_special("Solo"));
    assert_eq!(report.special.len(), 1);
    assert!(!report.special[0].significant);
}

#[test]
fn test_traffic_report_without_significant_changes() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "traffic.csv",
        "ID,Merchant,Baseline,Current\n\
         104,Delta,20,21\n",
    );
    let mut special = StaticValues::default();

    let run = run_traffic(
        tmp.path(),
        &["--duty-officer", "Ivanova", "--report-time", "09:30"],
        &mut special,
    );

    assert!(!run.report.threshold.has_significant());
    assert_eq!(run.report.dump.len(), 1);
    assert_eq!(
        run.duty.no_changes_sentence(),
        "Duty officer Ivanova. At 09:30 a report was made for 13.01.2026. \
         No traffic changes crossing the growth or decline thresholds were found. \
         Everything was checked, traffic did not change."
    );
}

#[test]
fn test_traffic_profile_buckets() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "traffic.csv",
        "ID,Merchant,Baseline,Current\n\
         101,Acme,100,150\n\
         5084,Excluded Ltd,10,0\n\
         1020,Hidden Co,10,30\n\
         ,Loose,5,6\n\
         ,AA77 Account,1,2\n",
    );
    write(
        tmp.path(),
        "profile.json",
        r#"{"excluded_ids": ["5084"], "hidden_ids": ["1020"]}"#,
    );
    let mut special = StaticValues::default();

    let run = run_traffic(tmp.path(), &[], &mut special);
    let report = &run.report;

    assert_eq!(subjects(report.excluded.iter()), vec!["5084 Excluded Ltd"]);
    assert_eq!(subjects(report.hidden.iter()), vec!["1020 Hidden Co"]);
    assert_eq!(subjects(report.empty_id.iter()), vec!["Loose"]);
    assert_eq!(
        subjects(report.dump.iter()),
        vec!["Hidden Co", "AA77 Account", "101 Acme"]
    );
}

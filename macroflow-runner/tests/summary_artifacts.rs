//! Summary run over a hand-written merged table.

use chrono::NaiveDate;
use macroflow_runner::{run_eda, EdaOptions, PipelineError, SummaryError};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "Date,USD_CNY_Rate,US_Interest_Rate,Gold_Price,US_CPI,CN_CPI,CN_LPR,SP500_Close,CN_M2,CN_Stock_Price";

/// Four month-ends. USD_CNY_Rate ends 100 → 110; CN_LPR has a zero prior.
fn write_table(path: &Path) {
    let rows = [
        "2024-01-31,7.0,5.0,2000,300,100,3.5,4800,290,3000",
        "2024-02-29,8.0,5.0,2050,301,101,3.5,4900,291,3100",
        "2024-03-31,100.0,5.25,2100,302,101,0,5000,292,3050",
        "2024-04-30,110.0,5.5,2150,303,102,3.45,5100,293,3200",
    ];
    let mut text = String::from(HEADER);
    text.push('\n');
    for r in rows {
        text.push_str(r);
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn options(dir: &TempDir) -> EdaOptions {
    EdaOptions {
        input: dir.path().join("master_data.csv"),
        out_dir: dir.path().join("eda"),
        from: None,
        to: None,
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn writes_all_four_artifacts() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);

    let out = run_eda(&opts).unwrap();
    assert_eq!(out.rows, 4);
    for p in [
        &out.artifacts.describe,
        &out.artifacts.correlation,
        &out.artifacts.metrics,
        &out.artifacts.kpis,
    ] {
        assert!(p.exists(), "{} missing", p.display());
    }
}

#[test]
fn kpis_report_period_changes() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);
    let out = run_eda(&opts).unwrap();

    let kpis = read_json(&out.artifacts.kpis);
    assert_eq!(kpis["date"], "2024-04-30");

    let fx = &kpis["items"]["USD_CNY_Rate"];
    assert_eq!(fx["value"], 110.0);
    assert!((fx["mom_pct"].as_f64().unwrap() - 0.10).abs() < 1e-12);
    // 7.0 → 110.0
    assert!((fx["qoq_pct"].as_f64().unwrap() - 103.0 / 7.0).abs() < 1e-12);

    let lpr = &kpis["items"]["CN_LPR"];
    assert_eq!(lpr["value"], 3.45);
    assert!(lpr["mom_pct"].is_null());

    let keys: Vec<&String> = kpis["items"].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 9);
}

#[test]
fn metrics_json_has_every_key() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);
    let out = run_eda(&opts).unwrap();

    let m = read_json(&out.artifacts.metrics);
    for key in [
        "volatility_usd_cny",
        "interest_spread_mean",
        "inflation_spread_mean",
        "corr_usd_cny_gold",
        "corr_usd_cny_interest_spread",
        "corr_usd_cny_sp500",
        "corr_usd_cny_cn_stock",
        "skew_usd_cny",
    ] {
        assert!(m.get(key).is_some(), "{key} missing");
    }
    // mean of (300-100, 301-101, 302-101, 303-102)
    assert!((m["inflation_spread_mean"].as_f64().unwrap() - 200.5).abs() < 1e-12);
    assert!(m["corr_usd_cny_gold"].as_f64().unwrap() > 0.0);
}

#[test]
fn describe_and_correlation_layout() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);
    let out = run_eda(&opts).unwrap();

    let describe = fs::read_to_string(&out.artifacts.describe).unwrap();
    let lines: Vec<&str> = describe.lines().collect();
    assert!(lines[0].starts_with(",USD_CNY_Rate,"));
    let labels: Vec<&str> = lines[1..].iter().map(|l| l.split(',').next().unwrap()).collect();
    assert_eq!(labels, vec!["count", "mean", "std", "min", "25%", "50%", "75%", "max"]);
    assert!(lines[1].starts_with("count,4,"));

    let corr = fs::read_to_string(&out.artifacts.correlation).unwrap();
    let lines: Vec<&str> = corr.lines().collect();
    assert!(lines[0].starts_with(",USD_CNY_Rate,"));
    assert_eq!(lines.len(), 10);
    let diag: f64 = lines[1].split(',').nth(1).unwrap().parse().unwrap();
    assert!(lines[1].starts_with("USD_CNY_Rate,"));
    assert!((diag - 1.0).abs() < 1e-12);
}

#[test]
fn window_restricts_rows() {
    let dir = TempDir::new().unwrap();
    let opts = EdaOptions {
        from: NaiveDate::from_ymd_opt(2024, 2, 1),
        to: NaiveDate::from_ymd_opt(2024, 3, 31),
        ..options(&dir)
    };
    write_table(&opts.input);

    let out = run_eda(&opts).unwrap();
    assert_eq!(out.rows, 2);
    assert_eq!(
        out.report.kpis.date,
        NaiveDate::from_ymd_opt(2024, 3, 31)
    );
}

#[test]
fn missing_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = run_eda(&options(&dir)).unwrap_err();
    assert!(matches!(err, PipelineError::NoInput(_)));
}

#[test]
fn missing_metric_column_is_reported() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    fs::write(&opts.input, "Date,USD_CNY_Rate\n2024-01-31,7.1\n").unwrap();

    let err = run_eda(&opts).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Summary(SummaryError::MissingColumn(_))
    ));
}

fn staged_leftovers(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn export_leaves_no_staged_files() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);

    run_eda(&opts).unwrap();
    run_eda(&opts).unwrap();
    assert!(staged_leftovers(&opts.out_dir).is_empty());
}

#[test]
fn failed_staging_keeps_previous_artifacts() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);
    let first = run_eda(&opts).unwrap();
    let describe_before = fs::read_to_string(&first.artifacts.describe).unwrap();

    // the last artifact cannot be staged
    fs::create_dir(opts.out_dir.join("kpis.json.tmp")).unwrap();
    let windowed = EdaOptions {
        from: NaiveDate::from_ymd_opt(2024, 3, 1),
        ..options(&dir)
    };
    let err = run_eda(&windowed).unwrap_err();
    assert!(matches!(err, PipelineError::Export(_)));

    assert_eq!(
        fs::read_to_string(&first.artifacts.describe).unwrap(),
        describe_before
    );
    for name in ["describe.csv.tmp", "correlation.csv.tmp", "metrics.json.tmp"] {
        assert!(!opts.out_dir.join(name).exists(), "{name} left behind");
    }
}

#[test]
fn directory_in_place_of_artifact_blocks_every_write() {
    let dir = TempDir::new().unwrap();
    let opts = options(&dir);
    write_table(&opts.input);
    fs::create_dir_all(opts.out_dir.join("kpis.json")).unwrap();

    let err = run_eda(&opts).unwrap_err();
    assert!(matches!(err, PipelineError::Export(_)));
    assert!(!opts.out_dir.join("describe.csv").exists());
    assert!(staged_leftovers(&opts.out_dir).is_empty());
}

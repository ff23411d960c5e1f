use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str =
    "CONTENT_SLUG,SERP_KEYWORD,EST_NET_REVENUE,SELLSIDE_CLICKS_NETWORK,SELLSIDE_SEARCHES,REGION_CODE";

fn write_fixture(root: &Path) {
    let mut rows = vec![HEADER.to_string()];
    for k in 0..3 {
        rows.push(format!("/mortgage-rates,mortgage term {k},40,10,40,US"));
        rows.push(format!("/refinance-guide,mortgage term {k},20,5,20,CA"));
        rows.push(format!("/payday-loans-now,payday term {k},25,10,40,US"));
        rows.push(format!("/quick-cash,payday term {k},12.5,5,20,"));
    }
    rows.push("/about,orphan keyword,3,0,0,US".to_string());
    // One coerced revenue cell and one row without a slug.
    rows.push("/about,orphan keyword,n/a,0,0,US".to_string());
    rows.push(",orphan keyword,9,1,1,US".to_string());
    fs::write(root.join("input.csv"), rows.join("\n") + "\n").unwrap();

    let mut taxonomy = vec!["keyword,angle,category".to_string()];
    for k in 0..3 {
        taxonomy.push(format!("mortgage term {k},Mortgages,Finance"));
        taxonomy.push(format!("payday term {k},Short Term Credit,Finance"));
    }
    fs::write(root.join("taxonomy.csv"), taxonomy.join("\n") + "\n").unwrap();
}

#[allow(deprecated)]
fn cli(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("attribution").expect("binary");
    cmd.current_dir(root).arg("--quiet");
    cmd
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).expect("valid json")
}

#[test]
fn run_writes_every_artifact() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_fixture(root);

    let output = cli(root)
        .args(["run", "--input", "input.csv", "--taxonomy", "taxonomy.csv", "--out", "out"])
        .args(["--min-fanout", "2", "--min-shared", "2", "--max-cluster-share", "0.5"])
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(summary["status"], "ok");
    assert_eq!(summary["clusters"], 3);
    assert_eq!(summary["excluded_clusters"], 1);
    assert_eq!(summary["opportunities"], 2);

    let out = root.join("out");
    for name in [
        "clusters.csv",
        "membership.csv",
        "opportunities.csv",
        "regions.csv",
        "exclusions.csv",
        "blueprints.json",
        "run_report.json",
        "report.md",
    ] {
        assert!(out.join(name).exists(), "missing {name}");
    }

    let membership = fs::read_to_string(out.join("membership.csv")).unwrap();
    assert_eq!(membership.lines().count(), 1 + 5);
    assert!(membership.starts_with("cluster_id,slug\n"));

    let exclusions = fs::read_to_string(out.join("exclusions.csv")).unwrap();
    assert!(exclusions.contains("payday,label_keyword,payday term 0"));

    let blueprints = read_json(&out.join("blueprints.json"));
    assert_eq!(blueprints["schema_version"], 1);
    assert_eq!(blueprints["degraded"], false);
    let first = &blueprints["opportunities"][0];
    assert_eq!(first["rank"], 1);
    assert_eq!(first["label_angle"], "Mortgages");
    let share_sum: f64 = first["lanes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|lane| lane["share"].as_f64().unwrap())
        .sum();
    assert!((share_sum - 1.0).abs() < 1e-9);

    let report = read_json(&out.join("run_report.json"));
    assert_eq!(report["degraded"], false);
    assert_eq!(report["load"]["rows_seen"], 15);
    assert_eq!(report["load"]["rows_dropped"], 1);
    assert_eq!(report["load"]["rows_coerced"], 1);
    assert_eq!(report["config"]["graph"]["min_keyword_fanout"], 2);
    assert_eq!(report["input_sha256"].as_str().unwrap().len(), 64);

    let md = fs::read_to_string(out.join("report.md")).unwrap();
    assert!(md.contains("# Attribution run report"));
}

#[test]
fn co_occurrence_config_runs_degraded() {
    let temp = tempdir().unwrap();
    let root = temp.path();

    let mut rows = vec![HEADER.to_string()];
    for i in 0..40 {
        rows.push(format!("/article-{i:02},loans,5,2,10,US"));
    }
    fs::write(root.join("input.csv"), rows.join("\n") + "\n").unwrap();
    fs::write(root.join("taxonomy.csv"), "keyword,angle\nloans,Personal Loans\n").unwrap();
    fs::write(root.join("run.toml"), "[graph]\nedge_rule = \"co_occurrence\"\n").unwrap();

    let output = cli(root)
        .args(["run", "--input", "input.csv", "--taxonomy", "taxonomy.csv"])
        .args(["--config", "run.toml", "--out", "out"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["status"], "degraded");
    assert_eq!(summary["largest_cluster"], 40);

    let report = read_json(&root.join("out/run_report.json"));
    assert_eq!(report["degraded"], true);
    assert_eq!(report["warnings"][0]["top_keyword"], "loans");
    assert_eq!(report["warnings"][0]["top_keyword_merges"], 39);
    assert_eq!(read_json(&root.join("out/blueprints.json"))["degraded"], true);
}

#[test]
fn missing_columns_fail_before_writing() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(
        root.join("input.csv"),
        "CONTENT_SLUG,SERP_KEYWORD,REVENUE\n/a,kw,1\n",
    )
    .unwrap();
    fs::write(root.join("taxonomy.csv"), "keyword,angle\nkw,Topic\n").unwrap();

    cli(root)
        .args(["run", "--input", "input.csv", "--taxonomy", "taxonomy.csv", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("EST_NET_REVENUE"))
        .stderr(predicate::str::contains("SELLSIDE_SEARCHES"));
    assert!(!root.join("out").exists());
}

#[test]
fn invalid_override_is_rejected() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_fixture(root);

    cli(root)
        .args(["run", "--input", "input.csv", "--taxonomy", "taxonomy.csv", "--out", "out"])
        .args(["--min-jaccard", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_jaccard"));
}

#[test]
fn diagnose_compares_edge_rules() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    write_fixture(root);

    let output = cli(root)
        .args(["diagnose", "--input", "input.csv", "--taxonomy", "taxonomy.csv"])
        .args(["--min-fanout", "2", "--min-shared", "2"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let diagnosis: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(diagnosis["slugs"], 5);
    let rules = diagnosis["rules"].as_array().unwrap();
    assert_eq!(rules[0]["rule"], "jaccard");
    assert_eq!(rules[1]["rule"], "co_occurrence");
    assert_eq!(rules[0]["clusters"], 3);
}

#[test]
fn schema_describes_the_blueprint_document() {
    let temp = tempdir().unwrap();
    cli(temp.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("opportunities"))
        .stdout(predicate::str::contains("schema_version"));
}

use crate::pipeline::{PipelineOutput, RunReport};
use crate::report::render_run_report;
use anyhow::{Context, Result};
use attribution_protocol::{serialize_json_pretty, OpportunityRow};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CLUSTERS_CSV: &str = "clusters.csv";
pub const MEMBERSHIP_CSV: &str = "membership.csv";
pub const OPPORTUNITIES_CSV: &str = "opportunities.csv";
pub const REGIONS_CSV: &str = "regions.csv";
pub const EXCLUSIONS_CSV: &str = "exclusions.csv";
pub const BLUEPRINTS_JSON: &str = "blueprints.json";
pub const RUN_REPORT_JSON: &str = "run_report.json";
pub const REPORT_MD: &str = "report.md";

/// Write every artifact of a finished run into `out_dir`.
///
/// Nothing is recomputed here; each file is a projection of `output`.
pub fn write_artifacts(
    out_dir: &Path,
    output: &PipelineOutput,
    report: &RunReport,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;
    let mut written = Vec::new();

    let clusters = &output.aggregation.clusters;
    written.push(write_csv(
        out_dir,
        CLUSTERS_CSV,
        clusters.iter().map(|c| c.summary_row()),
    )?);
    written.push(write_csv(
        out_dir,
        MEMBERSHIP_CSV,
        clusters.iter().flat_map(|c| c.membership_rows()),
    )?);
    written.push(write_csv(
        out_dir,
        OPPORTUNITIES_CSV,
        output.blueprints.iter().map(OpportunityRow::from),
    )?);
    written.push(write_csv(
        out_dir,
        REGIONS_CSV,
        output.aggregation.regions.iter().map(|r| r.row()),
    )?);
    written.push(write_csv(
        out_dir,
        EXCLUSIONS_CSV,
        output.exclusions.iter(),
    )?);

    written.push(write_text(
        out_dir,
        BLUEPRINTS_JSON,
        &serialize_json_pretty(&output.blueprint_document())?,
    )?);
    written.push(write_text(
        out_dir,
        RUN_REPORT_JSON,
        &serde_json::to_string_pretty(report)?,
    )?);
    written.push(write_text(out_dir, REPORT_MD, &render_run_report(report, output))?);

    log::info!("Wrote {} artifacts to {}", written.len(), out_dir.display());
    Ok(written)
}

/// Header row is written even when there are no records
fn write_csv<T, I>(out_dir: &Path, name: &str, rows: I) -> Result<PathBuf>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let path = out_dir.join(name);
    let mut rows = rows.into_iter().peekable();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if rows.peek().is_none() {
        if let Some(header) = empty_header(name) {
            writer.write_record(header)?;
        }
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush()?;
    Ok(path)
}

/// Column names, used only when a table has no rows
fn empty_header(name: &str) -> Option<&'static [&'static str]> {
    match name {
        CLUSTERS_CSV => Some(&[
            "cluster_id",
            "label_keyword",
            "label_angle",
            "slug_count",
            "keyword_count",
            "clicks",
            "searches",
            "revenue",
            "rpc",
            "rps",
            "excluded",
        ]),
        MEMBERSHIP_CSV => Some(&["cluster_id", "slug"]),
        EXCLUSIONS_CSV => Some(&["cluster_id", "phrase", "field", "value"]),
        REGIONS_CSV => Some(&["cluster_id", "region", "revenue", "clicks", "searches"]),
        OPPORTUNITIES_CSV => Some(&[
            "rank",
            "cluster_id",
            "label_keyword",
            "label_angle",
            "slug_count",
            "revenue",
            "clicks",
            "searches",
            "rpc",
            "rps",
            "predicted_delta_cm",
            "recommended_budget",
            "canary_budget",
            "target_cpa",
            "kill_threshold_cpa",
            "freeze_window_days",
            "lane_mix",
            "canary_lanes",
        ]),
        _ => None,
    }
}

fn write_text(out_dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
    let path = out_dir.join(name);
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

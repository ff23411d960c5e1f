use crate::pipeline::{PipelineOutput, RunReport};

/// Human summary of a run (`report.md`)
pub fn render_run_report(report: &RunReport, output: &PipelineOutput) -> String {
    let mut md = String::new();
    md.push_str("# Attribution run report\n\n");
    md.push_str(&format!("- Version: `{}`\n", report.tool_version));
    md.push_str(&format!("- Input: `{}`\n", short_digest(&report.input_sha256)));
    md.push_str(&format!(
        "- Taxonomy: `{}`\n",
        short_digest(&report.taxonomy_sha256)
    ));
    md.push_str(&format!("- Config: `{}`\n", short_digest(&report.config_sha256)));
    md.push_str(&format!(
        "- Status: `{}`\n\n",
        if report.degraded { "degraded" } else { "ok" }
    ));

    md.push_str("## Input\n\n");
    md.push_str(&format!(
        "- Rows: `{}` seen, `{}` kept, `{}` dropped, `{}` coerced\n",
        report.load.rows_seen,
        report.load.rows_kept(),
        report.load.rows_dropped,
        report.load.rows_coerced
    ));
    md.push_str(&format!(
        "- Keywords: `{}` total, `{}` eligible (`{}` without angle, `{}` catch-all, `{}` below fan-out)\n",
        report.index.keywords,
        report.index.eligible_keywords,
        report.index.without_angle,
        report.index.catch_all,
        report.index.below_fanout
    ));
    md.push_str(&format!(
        "- Graph: `{}` candidate pairs, `{}` edges (`{}` rejected on overlap, `{}` on Jaccard)\n\n",
        report.graph.candidate_pairs,
        report.graph.accepted_edges,
        report.graph.rejected_by_overlap,
        report.graph.rejected_by_jaccard
    ));

    md.push_str("## Clusters\n\n");
    md.push_str(&format!(
        "- `{}` slugs in `{}` clusters, largest `{}` (ceiling `{}`)\n",
        report.slugs, report.clusters, report.largest_cluster, report.cluster_ceiling
    ));
    md.push_str(&format!(
        "- Excluded by denylist: `{}`\n\n",
        report.excluded_clusters
    ));

    if !report.warnings.is_empty() {
        md.push_str("## Oversized clusters\n\n");
        md.push_str("| cluster | slugs | share | top keyword | merges |\n");
        md.push_str("|---:|---:|---:|---|---:|\n");
        for w in &report.warnings {
            md.push_str(&format!(
                "| `{}` | `{}` | `{:.1}%` | `{}` | `{}/{}` |\n",
                w.cluster_id,
                w.size,
                w.share * 100.0,
                escape_cell(w.top_keyword.as_deref().unwrap_or("n/a")),
                w.top_keyword_merges,
                w.total_merges
            ));
        }
        md.push('\n');
    }

    md.push_str("## Top opportunities\n\n");
    if output.blueprints.is_empty() {
        md.push_str("_No eligible clusters._\n");
        return md;
    }
    md.push_str("| rank | cluster | label | slugs | revenue | rpc | Δcm | budget | lanes |\n");
    md.push_str("|---:|---:|---|---:|---:|---:|---:|---:|---|\n");
    for bp in &output.blueprints {
        let lanes = bp
            .lanes
            .iter()
            .map(|l| format!("{} {:.0}%", l.lane, l.share * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        md.push_str(&format!(
            "| `{}` | `{}` | {} | `{}` | `{:.2}` | `{}` | `{:.2}` | `{:.2}` | {} |\n",
            bp.rank,
            bp.cluster_id,
            escape_cell(&truncate_one_line(
                bp.label_keyword.as_deref().unwrap_or("n/a"),
                60
            )),
            bp.slugs.len(),
            bp.metrics.revenue,
            bp.metrics.rpc.map_or("n/a".to_string(), |v| format!("{v:.2}")),
            bp.budget.predicted_delta_cm,
            bp.budget.recommended,
            escape_cell(&lanes),
        ));
    }
    md
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let s = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if s.chars().count() <= max_chars {
        return s;
    }
    let truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

//! Human-readable run summaries.

use colored::Colorize;
use std::path::Path;

use permasite::estimate::Plan;
use permasite::{Extraction, IssueKind, PublishedSite, RunReport};

pub fn print_extraction(extraction: &Extraction, location: &Path) {
    let graph = &extraction.graph;
    let fetched = graph.assets.iter().filter(|a| a.is_fetched()).count();

    println!();
    println!("{}", "Snapshot saved".bright_green().bold());
    println!("  Site:     {}", graph.seed.cyan());
    println!("  Pages:    {}", graph.pages.len());
    println!("  Assets:   {fetched}");
    println!("  Size:     {}", human_bytes(graph.total_bytes() as u64));
    println!("  Location: {}", location.display());
    print_report(&extraction.report);
}

pub fn print_publication(published: &PublishedSite, gateway: &str, dry_run: bool) {
    let publication = &published.publication;

    println!();
    for pass in &publication.passes {
        let label = match pass.round {
            Some(round) => format!("{} (round {round})", pass.pass),
            None => pass.pass.to_string(),
        };
        println!(
            "  {:<22} {:>4} uploaded  {:>4} unchanged  {:>4} failed",
            label, pass.uploaded, pass.unchanged, pass.failed
        );
    }

    println!();
    let heading = if dry_run { "Dry run complete" } else { "Site published" };
    println!("{}", heading.bright_green().bold());
    println!("  Routes:   {}", published.manifest.len());
    println!("  Manifest: {}", published.manifest_id.bold());
    println!(
        "  URL:      {}",
        format!("{}/{}", gateway.trim_end_matches('/'), published.manifest_id).cyan()
    );
    print_report(&publication.report);
}

pub fn print_plan(site: &str, plan: &Plan) {
    println!();
    println!("{} {}", "Upload plan for".bold(), site.cyan());
    for pass in &plan.passes {
        println!(
            "  {:<12} {:>6} objects  {:>10}",
            pass.pass.to_string(),
            pass.objects,
            human_bytes(pass.bytes)
        );
    }
    println!(
        "  {:<12} {:>6} objects  {:>10}",
        "total",
        plan.total_objects(),
        human_bytes(plan.total_bytes())
    );
    if plan.page_rounds > 2 {
        println!("  Pages counted once per round ({} rounds).", plan.page_rounds);
    }
    if plan.skipped_assets > 0 {
        println!(
            "  {}",
            format!("{} assets were never fetched and will be skipped", plan.skipped_assets).yellow()
        );
    }
}

fn print_report(report: &RunReport) {
    if report.is_clean() {
        return;
    }

    println!();
    println!("{}", format!("{} warnings", report.issues.len()).yellow().bold());
    for kind in [
        IssueKind::FetchFailure,
        IssueKind::ErrorPageDetected,
        IssueKind::UploadFailure,
        IssueKind::CanonicalizationAmbiguity,
    ] {
        for issue in report.of_kind(kind) {
            println!("  {} {}: {}", format!("[{kind}]").yellow(), issue.target, issue.detail);
        }
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024 + 512 * 1024), "5.5 MiB");
    }
}

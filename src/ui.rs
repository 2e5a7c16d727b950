//! Terminal output for the CLI.
//!
//! `format_*` functions build plain text and are unit tested; `display_*`
//! functions add styling and print.

use crate::branch_service::{BranchResult, BranchStatus};
use crate::domain::{ComponentVersionMap, Version};
use crate::pipeline::{BatchReport, ProfileReport, ProfileStatus};
use crate::propagator::PropagateOutcome;
use console::style;

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

pub fn display_warning(message: &str) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), message);
}

/// Every derived view of a version as `(label, value)` pairs
pub fn format_version_views(version: &Version) -> Vec<(&'static str, String)> {
    let mut views = vec![
        ("version", version.to_string()),
        ("edition", version.edition.short_name().to_string()),
        ("minor", version.to_minor()),
        ("patch", version.to_patch()),
        ("milestone", version.milestone_name()),
        ("stable branch", version.stable_branch(false)),
        ("stable branch (ee)", version.stable_branch(true)),
        ("tag", version.tag(false)),
        ("packager", version.to_packager(version.is_ee())),
        ("container", version.to_container(version.is_ee())),
    ];

    let neighbours = [
        ("next patch", version.next_patch()),
        ("next minor", version.next_minor()),
        ("next major", version.next_major()),
    ];
    for (label, next) in neighbours {
        if let Ok(next) = next {
            views.push((label, next.to_string()));
        }
    }

    if let Ok(previous) = version.previous_patch() {
        views.push(("previous patch", previous.to_string()));
    }
    if let Some(previous) = version.previous_tag(false) {
        views.push(("previous tag", previous));
    }

    views
}

pub fn display_version(version: &Version) {
    println!("\n{}", style(format!("Version {}", version)).bold());
    for (label, value) in format_version_views(version) {
        println!("  {:<20} {}", format!("{}:", label), style(value).cyan());
    }
}

pub fn display_versions(title: &str, versions: &ComponentVersionMap) {
    println!("\n{}", style(title).bold().underlined());
    for (component, version) in versions.iter() {
        println!("  {}: {}", component, style(version).cyan());
    }
}

/// One summary line for a packager
pub fn format_profile_line(report: &ProfileReport) -> String {
    let propagation = match &report.propagation {
        Some(PropagateOutcome::Committed(commit)) => {
            format!("committed {}", crate::domain::tag::short_ref(&commit.id))
        }
        Some(PropagateOutcome::Unchanged) => "unchanged".to_string(),
        Some(PropagateOutcome::DryRun) => "dry run".to_string(),
        Some(PropagateOutcome::Failed(_)) => "commit failed".to_string(),
        None => "not run".to_string(),
    };

    let tagging = match &report.tagging {
        Some(outcome) => match &outcome.tag {
            Some(tag) => format!("{} {}", outcome.state, tag.name),
            None => outcome.state.to_string(),
        },
        None => "not tagged".to_string(),
    };

    let status = match &report.status {
        ProfileStatus::Completed => String::new(),
        ProfileStatus::Failed(message) => format!(" ({})", message),
        ProfileStatus::Cancelled(message) => format!(" ({})", message),
    };

    format!(
        "{} [{}]: {}, {}{}",
        report.profile, report.project, propagation, tagging, status
    )
}

pub fn display_batch_report(report: &BatchReport) {
    println!(
        "\n{}",
        style(format!("Auto-deploy {} at {}", report.branch, report.commit)).bold()
    );
    for profile in &report.profiles {
        let line = format_profile_line(profile);
        if profile.is_success() {
            display_success(&line);
        } else {
            display_error(&line);
        }
    }
}

pub fn format_branch_result(result: &BranchResult) -> String {
    let from = result
        .from
        .as_deref()
        .map(crate::domain::tag::short_ref)
        .unwrap_or("?");

    match &result.status {
        BranchStatus::Created => format!("{}: {} from {}", result.project, result.branch, from),
        BranchStatus::DryRun => format!(
            "{}: would create {} from {}",
            result.project, result.branch, from
        ),
        BranchStatus::Failed(message) => {
            format!("{}: {} failed: {}", result.project, result.branch, message)
        }
    }
}

pub fn display_branch_results(results: &[BranchResult]) {
    for result in results {
        let line = format_branch_result(result);
        match result.status {
            BranchStatus::Failed(_) => display_error(&line),
            BranchStatus::DryRun => display_status(&line),
            BranchStatus::Created => display_success(&line),
        }
    }
}

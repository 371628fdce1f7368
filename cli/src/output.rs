use std::fmt::Write;

use colored::Colorize;

use ghpulse_core::model::{Activity, AuthorStats, DayCount, Report};

const MAX_BAR: usize = 30;

pub fn set_color_enabled(enabled: bool) {
    colored::control::set_override(enabled);
}

pub fn render_terminal(report: &Report, show_authors: bool) {
    print!("{}", render_text(report, show_authors));
}

pub fn render_text(report: &Report, show_authors: bool) -> String {
    let mut out = String::new();
    let act = &report.activity;

    let _ = writeln!(
        out,
        "{} {}  {}",
        "::".bold().cyan(),
        report.repository.bold().white(),
        format!("({})", report.default_branch).dimmed(),
    );
    let files_note = if report.files_skipped > 0 {
        format!(
            "({} files, {} binary or oversized skipped)",
            report.files_counted, report.files_skipped
        )
    } else {
        format!("({} files)", report.files_counted)
    };
    let _ = writeln!(
        out,
        "  {:<22}{}  {}",
        "Lines of code",
        group_thousands(report.lines_of_code).bold(),
        files_note.dimmed(),
    );
    let _ = writeln!(out, "  {:<22}{}", "Total commits", act.commits);
    let _ = writeln!(out, "  {:<22}{}", "Total coding days", act.coding_days);
    let _ = writeln!(
        out,
        "  {:<22}{:.2}",
        "Avg commits per day", act.avg_commits_per_day
    );
    if let Some(period) = active_period(act) {
        let _ = writeln!(out, "  {:<22}{}", "Active period", period);
    }
    let _ = writeln!(out, "  {:<22}{}", "Developers", report.developers);

    let _ = writeln!(out);
    let _ = writeln!(out, "  {} {}", ">>".green(), "Last 7 days".green());
    for day in &act.last_7_days {
        let _ = writeln!(out, "{}", day_line(day));
    }

    if show_authors && !report.authors.is_empty() {
        let _ = writeln!(out);
        for author in &report.authors {
            render_author(&mut out, author);
        }
    }
    out
}

fn render_author(out: &mut String, author: &AuthorStats) {
    let act = &author.activity;
    let _ = writeln!(
        out,
        "  {} {}  {}",
        ">>".green(),
        author.author.green(),
        format!(
            "({} commits, {} coding days, {:.2}/day)",
            act.commits, act.coding_days, act.avg_commits_per_day
        )
        .dimmed(),
    );
    if let Some(period) = active_period(act) {
        let _ = writeln!(out, "     {}", period.dimmed());
    }
    let recent: Vec<String> = act
        .last_7_days
        .iter()
        .map(|d| d.commits.to_string())
        .collect();
    let _ = writeln!(
        out,
        "     last 7 days: {}  {}",
        recent.join(" "),
        format!("({} total)", act.recent_commits()).dimmed(),
    );
    if let Some(changes) = &author.changes {
        let unit = if changes.files_changed == 1 { "file" } else { "files" };
        let _ = writeln!(
            out,
            "     changes: {} {unit}, +{} -{}  {}",
            changes.files_changed,
            changes.lines_added,
            changes.lines_removed,
            format!("({:+} net)", changes.net_lines()).dimmed(),
        );
    }
}

fn day_line(day: &DayCount) -> String {
    let label = day.date.format("%Y-%m-%d %a").to_string();
    let bar = "\u{25a0}".repeat(day.commits.min(MAX_BAR));
    if day.commits == 0 {
        format!("    {}  {}", label.dimmed(), format!("{:>3}", 0).dimmed())
    } else {
        format!("    {}  {:>3}  {}", label, day.commits, bar.green())
    }
}

fn active_period(act: &Activity) -> Option<String> {
    let (first, last) = (act.first_commit?, act.last_commit?);
    let days = act.days_active;
    let unit = if days == 1 { "day" } else { "days" };
    Some(format!("{first} to {last} ({days} {unit})"))
}

pub(crate) fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn summary_line(report: &Report) -> String {
    let commits = report.activity.commits;
    let files = report.files_counted + report.files_skipped;
    match (commits, files) {
        (0, 0) => "Repository is empty.".to_string(),
        (1, 1) => "Fetched 1 commit and 1 file".to_string(),
        (c, 1) => format!("Fetched {c} commits and 1 file"),
        (1, f) => format!("Fetched 1 commit and {f} files"),
        (c, f) => format!("Fetched {c} commits and {f} files"),
    }
}

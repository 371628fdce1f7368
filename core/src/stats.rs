use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::model::{
    Activity, AuthorStats, ChangeStats, CommitChanges, CommitRecord, DayCount, FileEntry,
};
use crate::period::{span_days, trailing_days, RECENT_DAYS};

pub fn total_lines(files: &[FileEntry]) -> u64 {
    files.iter().map(|f| f.lines).sum()
}

/// Average commits per coding day; zero when there are no coding days.
pub fn average_per_day(commits: usize, days: usize) -> f64 {
    if days == 0 {
        0.0
    } else {
        commits as f64 / days as f64
    }
}

pub fn commits_by_day<'a>(
    commits: impl IntoIterator<Item = &'a CommitRecord>,
) -> BTreeMap<NaiveDate, usize> {
    let mut by_day = BTreeMap::new();
    for commit in commits {
        *by_day.entry(commit.date).or_insert(0) += 1;
    }
    by_day
}

/// One entry per day of the recent window ending at `today`, zeros included.
pub fn recent_breakdown(by_day: &BTreeMap<NaiveDate, usize>, today: NaiveDate) -> Vec<DayCount> {
    trailing_days(today, RECENT_DAYS)
        .into_iter()
        .map(|date| DayCount {
            date,
            commits: by_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

pub fn activity<'a>(
    commits: impl IntoIterator<Item = &'a CommitRecord>,
    today: NaiveDate,
) -> Activity {
    let by_day = commits_by_day(commits);
    let total: usize = by_day.values().sum();
    let first_commit = by_day.keys().next().copied();
    let last_commit = by_day.keys().next_back().copied();
    let days_active = match (first_commit, last_commit) {
        (Some(first), Some(last)) => span_days(first, last),
        _ => 0,
    };

    Activity {
        commits: total,
        coding_days: by_day.len(),
        avg_commits_per_day: average_per_day(total, by_day.len()),
        first_commit,
        last_commit,
        days_active,
        last_7_days: recent_breakdown(&by_day, today),
    }
}

/// Per-author activity, busiest author first.
pub fn author_breakdown(commits: &[CommitRecord], today: NaiveDate) -> Vec<AuthorStats> {
    let mut grouped: BTreeMap<&str, Vec<&CommitRecord>> = BTreeMap::new();
    for commit in commits {
        grouped.entry(commit.author.as_str()).or_default().push(commit);
    }

    let mut authors: Vec<AuthorStats> = grouped
        .into_iter()
        .map(|(author, commits)| AuthorStats {
            author: author.to_string(),
            activity: activity(commits, today),
            changes: None,
        })
        .collect();

    authors.sort_by(|a, b| {
        b.activity
            .commits
            .cmp(&a.activity.commits)
            .then_with(|| a.author.cmp(&b.author))
    });
    authors
}

pub fn change_stats<'a>(changes: impl IntoIterator<Item = &'a CommitChanges>) -> ChangeStats {
    let mut paths = BTreeSet::new();
    let mut stats = ChangeStats::default();
    for change in changes {
        paths.extend(change.files.iter().map(String::as_str));
        stats.lines_added += change.additions;
        stats.lines_removed += change.deletions;
    }
    stats.files_changed = paths.len();
    stats
}

/// Fill in `changes` for every author from per-commit changes keyed by sha.
pub fn attach_changes(
    authors: &mut [AuthorStats],
    commits: &[CommitRecord],
    changes: &HashMap<String, CommitChanges>,
) {
    let mut by_author: HashMap<&str, Vec<&CommitChanges>> = HashMap::new();
    for commit in commits {
        if let Some(change) = changes.get(&commit.sha) {
            by_author.entry(commit.author.as_str()).or_default().push(change);
        }
    }
    for author in authors {
        let own = by_author.remove(author.author.as_str()).unwrap_or_default();
        author.changes = Some(change_stats(own));
    }
}

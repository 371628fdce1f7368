use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub lines: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub commits: usize,
}

/// Commit cadence for one set of commits (the whole team or one author).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub commits: usize,
    pub coding_days: usize,
    pub avg_commits_per_day: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_commit: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<NaiveDate>,
    pub days_active: i64,
    pub last_7_days: Vec<DayCount>,
}

/// Files touched and lines changed by one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitChanges {
    pub files: Vec<String>,
    pub additions: u64,
    pub deletions: u64,
}

/// Change volume of one author, summed over their commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeStats {
    /// Distinct paths touched.
    pub files_changed: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorStats {
    pub author: String,
    #[serde(flatten)]
    pub activity: Activity,
    /// Only collected on request, since it costs one request per commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub repository: String,
    pub default_branch: String,
    pub lines_of_code: u64,
    pub files_counted: usize,
    pub files_skipped: usize,
    #[serde(flatten)]
    pub activity: Activity,
    pub developers: usize,
    pub authors: Vec<AuthorStats>,
}

impl Activity {
    pub fn recent_commits(&self) -> usize {
        self.last_7_days.iter().map(|d| d.commits).sum()
    }
}

impl ChangeStats {
    pub fn net_lines(&self) -> i64 {
        self.lines_added as i64 - self.lines_removed as i64
    }
}

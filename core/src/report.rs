use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::Result;
use crate::github::{GitHubClient, Tree};
use crate::loc::{count_lines, MAX_BLOB_BYTES};
use crate::model::{CommitChanges, CommitRecord, FileEntry, Report};
use crate::stats;

/// Fetch stage, reported to the caller as the run advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Repository,
    Commits,
    Changes { done: usize, total: usize },
    Tree,
    Blobs { done: usize, total: usize },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Repository => write!(f, "Looking up repository..."),
            Phase::Commits => write!(f, "Fetching commit history..."),
            Phase::Changes { done, total } => {
                write!(f, "Reading commit changes ({done}/{total} commits)...")
            }
            Phase::Tree => write!(f, "Listing repository tree..."),
            Phase::Blobs { done, total } => write!(f, "Counting lines ({done}/{total} files)..."),
        }
    }
}

/// What to collect beyond the base metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Per-author files changed and lines added/removed. Costs one request per commit.
    pub changes: bool,
}

pub struct LineCount {
    pub files: Vec<FileEntry>,
    pub skipped: usize,
}

/// Download every text blob in `tree` and count its lines.
pub fn count_tree(
    client: &GitHubClient,
    tree: &Tree,
    progress: &mut impl FnMut(Phase),
) -> Result<LineCount> {
    let blobs: Vec<_> = tree.tree.iter().filter(|e| e.is_blob()).collect();
    let total = blobs.len();
    let mut files = Vec::with_capacity(total);
    let mut skipped = 0;

    for (done, entry) in blobs.into_iter().enumerate() {
        progress(Phase::Blobs { done, total });
        if entry.size.is_some_and(|size| size > MAX_BLOB_BYTES) {
            debug!(path = %entry.path, size = entry.size, "skipping oversized blob");
            skipped += 1;
            continue;
        }
        let content = client.blob(&entry.sha)?;
        match count_lines(&content) {
            Some(lines) => files.push(FileEntry {
                path: entry.path.clone(),
                lines,
            }),
            None => {
                debug!(path = %entry.path, "skipping binary blob");
                skipped += 1;
            }
        }
    }

    Ok(LineCount { files, skipped })
}

/// Files and line counts of every commit, keyed by sha.
pub fn fetch_changes(
    client: &GitHubClient,
    commits: &[CommitRecord],
    progress: &mut impl FnMut(Phase),
) -> Result<HashMap<String, CommitChanges>> {
    let total = commits.len();
    let mut changes = HashMap::with_capacity(total);
    for (done, commit) in commits.iter().enumerate() {
        progress(Phase::Changes { done, total });
        changes.insert(commit.sha.clone(), client.commit_files(&commit.sha)?);
    }
    Ok(changes)
}

/// Fetch everything the report needs, then aggregate it.
///
/// Nothing is returned unless every request succeeded.
pub fn collect_report(
    client: &GitHubClient,
    today: NaiveDate,
    options: ReportOptions,
    mut progress: impl FnMut(Phase),
) -> Result<Report> {
    progress(Phase::Repository);
    let repo = client.repository()?;
    info!(repository = %repo.full_name, branch = %repo.default_branch, "resolved repository");

    progress(Phase::Commits);
    let commits = client.commits()?;
    info!(count = commits.len(), "fetched commits");

    let changes = if options.changes {
        let changes = fetch_changes(client, &commits, &mut progress)?;
        info!(commits = changes.len(), "fetched commit changes");
        Some(changes)
    } else {
        None
    };

    progress(Phase::Tree);
    let tree = client.tree(&repo.default_branch)?;
    let counted = count_tree(client, &tree, &mut progress)?;
    info!(
        files = counted.files.len(),
        skipped = counted.skipped,
        "counted lines"
    );

    let mut authors = stats::author_breakdown(&commits, today);
    if let Some(changes) = &changes {
        stats::attach_changes(&mut authors, &commits, changes);
    }
    Ok(Report {
        repository: repo.full_name,
        default_branch: repo.default_branch,
        lines_of_code: stats::total_lines(&counted.files),
        files_counted: counted.files.len(),
        files_skipped: counted.skipped,
        activity: stats::activity(&commits, today),
        developers: authors.len(),
        authors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RepoId};
    use crate::error::MetricsError;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::Local;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("bad date {y}-{m}-{d}"))
    }

    fn config(uri: &str) -> Config {
        Config::new(
            "test-token",
            RepoId {
                owner: "octo".to_string(),
                name: "demo".to_string(),
            },
            uri,
        )
    }

    fn commit_json(sha: &str, login: &str, when: &str) -> Value {
        json!({
            "sha": sha,
            "commit": { "author": { "name": login, "date": when } },
            "author": { "login": login }
        })
    }

    fn blob_json(content: &[u8]) -> Value {
        json!({ "content": STANDARD.encode(content), "encoding": "base64" })
    }

    async fn mount_json(server: &MockServer, route: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Runs the blocking client off the async test runtime.
    async fn run_collect(uri: String, today: NaiveDate) -> Result<(Report, Vec<Phase>)> {
        run_collect_with(uri, today, ReportOptions::default()).await
    }

    async fn run_collect_with(
        uri: String,
        today: NaiveDate,
        options: ReportOptions,
    ) -> Result<(Report, Vec<Phase>)> {
        tokio::task::spawn_blocking(move || -> Result<(Report, Vec<Phase>)> {
            let client = GitHubClient::new(&config(&uri))?;
            let mut phases = Vec::new();
            let report = collect_report(&client, today, options, |p| phases.push(p))?;
            Ok((report, phases))
        })
        .await
        .unwrap_or_else(|e| panic!("blocking task failed: {e}"))
    }

    #[test]
    fn phase_messages() {
        assert_eq!(Phase::Commits.to_string(), "Fetching commit history...");
        assert_eq!(
            Phase::Blobs { done: 2, total: 5 }.to_string(),
            "Counting lines (2/5 files)..."
        );
        assert_eq!(
            Phase::Changes { done: 0, total: 4 }.to_string(),
            "Reading commit changes (0/4 commits)..."
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_report_from_mock_api() {
        let server = MockServer::start().await;
        let today = date(2024, 5, 10);
        let yesterday = date(2024, 5, 9);
        let noon = |d: NaiveDate| {
            d.and_hms_opt(12, 0, 0)
                .and_then(|t| t.and_local_timezone(Local).single())
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| panic!("no local noon on {d}"))
        };

        mount_json(
            &server,
            "/repos/octo/demo",
            json!({ "full_name": "octo/demo", "default_branch": "main" }),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "link",
                        format!(
                            "<{}/repos/octo/demo/commits?per_page=100&page=2>; rel=\"next\"",
                            server.uri()
                        )
                        .as_str(),
                    )
                    .set_body_json(json!([
                        commit_json("c1", "alice", &noon(today)),
                        commit_json("c2", "alice", &noon(today)),
                        commit_json("c3", "bob", &noon(today)),
                    ])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                commit_json("c4", "alice", &noon(yesterday)),
                commit_json("c5", "bob", &noon(yesterday)),
            ])))
            .with_priority(1)
            .mount(&server)
            .await;

        mount_json(
            &server,
            "/repos/octo/demo/git/trees/main",
            json!({
                "truncated": false,
                "tree": [
                    { "path": "src", "type": "tree", "sha": "t1" },
                    { "path": "src/a.rs", "type": "blob", "sha": "b1", "size": 30 },
                    { "path": "src/b.rs", "type": "blob", "sha": "b2", "size": 60 },
                    { "path": "logo.png", "type": "blob", "sha": "b3", "size": 8 },
                    { "path": "vendor/lib", "type": "commit", "sha": "s1" }
                ]
            }),
        )
        .await;
        let ten_lines = "x\n".repeat(10);
        let twenty_lines = "y\n".repeat(20);
        mount_json(&server, "/repos/octo/demo/git/blobs/b1", blob_json(ten_lines.as_bytes())).await;
        mount_json(&server, "/repos/octo/demo/git/blobs/b2", blob_json(twenty_lines.as_bytes())).await;
        mount_json(&server, "/repos/octo/demo/git/blobs/b3", blob_json(b"\x89PNG\0\0\0")).await;

        let (report, phases) = run_collect(server.uri(), today)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report.repository, "octo/demo");
        assert_eq!(report.default_branch, "main");
        assert_eq!(report.lines_of_code, 30);
        assert_eq!(report.files_counted, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.activity.commits, 5);
        assert_eq!(report.activity.coding_days, 2);
        assert!((report.activity.avg_commits_per_day - 2.5).abs() < f64::EPSILON);
        assert_eq!(report.activity.last_7_days.len(), 7);
        assert_eq!(report.activity.last_7_days[6].commits, 3);
        assert_eq!(report.activity.last_7_days[5].commits, 2);
        assert_eq!(report.developers, 2);
        assert_eq!(report.authors[0].author, "alice");
        assert_eq!(report.authors[0].activity.commits, 3);

        assert_eq!(phases.first(), Some(&Phase::Repository));
        assert!(phases.contains(&Phase::Blobs { done: 2, total: 3 }));
        assert!(report.authors.iter().all(|a| a.changes.is_none()));
        assert!(!phases.iter().any(|p| matches!(p, Phase::Changes { .. })));
    }

    async fn mount_small_repo(server: &MockServer, noon: &str) {
        mount_json(
            server,
            "/repos/octo/demo",
            json!({ "full_name": "octo/demo", "default_branch": "main" }),
        )
        .await;
        mount_json(
            server,
            "/repos/octo/demo/commits",
            json!([
                commit_json("c1", "alice", noon),
                commit_json("c2", "alice", noon),
                commit_json("c3", "bob", noon),
            ]),
        )
        .await;
        mount_json(
            server,
            "/repos/octo/demo/git/trees/main",
            json!({ "tree": [{ "path": "a.rs", "type": "blob", "sha": "b1", "size": 2 }] }),
        )
        .await;
        mount_json(server, "/repos/octo/demo/git/blobs/b1", blob_json(b"a\n")).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn changes_are_collected_per_author_on_request() {
        let server = MockServer::start().await;
        mount_small_repo(&server, "2024-05-10T12:00:00Z").await;
        mount_json(
            &server,
            "/repos/octo/demo/commits/c1",
            json!({ "sha": "c1", "files": [
                { "filename": "src/a.rs", "additions": 10, "deletions": 2 },
                { "filename": "src/b.rs", "additions": 5, "deletions": 0 }
            ]}),
        )
        .await;
        mount_json(
            &server,
            "/repos/octo/demo/commits/c2",
            json!({ "sha": "c2", "files": [
                { "filename": "src/a.rs", "additions": 1, "deletions": 4 }
            ]}),
        )
        .await;
        mount_json(
            &server,
            "/repos/octo/demo/commits/c3",
            json!({ "sha": "c3", "files": [
                { "filename": "README.md", "additions": 0, "deletions": 9 }
            ]}),
        )
        .await;

        let (report, phases) =
            run_collect_with(server.uri(), date(2024, 5, 10), ReportOptions { changes: true })
                .await
                .unwrap_or_else(|e| panic!("{e}"));

        let alice = report
            .authors
            .iter()
            .find(|a| a.author == "alice")
            .and_then(|a| a.changes.clone())
            .unwrap_or_else(|| panic!("alice has no change stats"));
        assert_eq!(alice.files_changed, 2);
        assert_eq!(alice.lines_added, 16);
        assert_eq!(alice.lines_removed, 6);
        assert_eq!(alice.net_lines(), 10);

        let bob = report
            .authors
            .iter()
            .find(|a| a.author == "bob")
            .and_then(|a| a.changes.clone())
            .unwrap_or_else(|| panic!("bob has no change stats"));
        assert_eq!(bob.files_changed, 1);
        assert_eq!(bob.net_lines(), -9);

        assert!(phases.contains(&Phase::Changes { done: 2, total: 3 }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_commit_detail_fails_the_report() {
        let server = MockServer::start().await;
        mount_small_repo(&server, "2024-05-10T12:00:00Z").await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/octo/demo/commits/c[0-9]$"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result =
            run_collect_with(server.uri(), date(2024, 5, 10), ReportOptions { changes: true }).await;
        assert!(matches!(result, Err(MetricsError::Api { status: 502, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_repository_reports_zeros() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/octo/demo",
            json!({ "full_name": "octo/demo", "default_branch": "main" }),
        )
        .await;
        let empty = json!({ "message": "Git Repository is empty." });
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/commits"))
            .respond_with(ResponseTemplate::new(409).set_body_json(empty.clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/trees/main"))
            .respond_with(ResponseTemplate::new(409).set_body_json(empty))
            .mount(&server)
            .await;

        let today = date(2024, 5, 10);
        let (report, _) = run_collect(server.uri(), today)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(report.lines_of_code, 0);
        assert_eq!(report.activity.commits, 0);
        assert_eq!(report.activity.coding_days, 0);
        assert_eq!(report.activity.avg_commits_per_day, 0.0);
        assert_eq!(report.activity.last_7_days.len(), 7);
        assert!(report.activity.last_7_days.iter().all(|d| d.commits == 0));
        assert_eq!(report.developers, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn bad_credentials_abort_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&server)
            .await;

        let result = run_collect(server.uri(), date(2024, 5, 10)).await;
        assert!(matches!(result, Err(MetricsError::Auth { status: 401, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_blob_fails_the_whole_report() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/octo/demo",
            json!({ "full_name": "octo/demo", "default_branch": "main" }),
        )
        .await;
        mount_json(&server, "/repos/octo/demo/commits", json!([])).await;
        mount_json(
            &server,
            "/repos/octo/demo/git/trees/main",
            json!({ "tree": [{ "path": "a.rs", "type": "blob", "sha": "b1", "size": 3 }] }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/blobs/b1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = run_collect(server.uri(), date(2024, 5, 10)).await;
        assert!(matches!(result, Err(MetricsError::Api { status: 500, .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_blobs_are_not_downloaded() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/repos/octo/demo",
            json!({ "full_name": "octo/demo", "default_branch": "main" }),
        )
        .await;
        mount_json(&server, "/repos/octo/demo/commits", json!([])).await;
        mount_json(
            &server,
            "/repos/octo/demo/git/trees/main",
            json!({ "tree": [{ "path": "dump.sql", "type": "blob", "sha": "big", "size": MAX_BLOB_BYTES + 1 }] }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/demo/git/blobs/big"))
            .respond_with(ResponseTemplate::new(200).set_body_json(blob_json(b"a\n")))
            .expect(0)
            .mount(&server)
            .await;

        let (report, _) = run_collect(server.uri(), date(2024, 5, 10))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.lines_of_code, 0);
    }
}

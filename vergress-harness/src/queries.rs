//! Built-in Workload Queries
//!
//! The default query set exercised against every version when the config does
//! not override it. Names are unique and stable: they key the report lines
//! and the pushed metric labels.

use vergress_core::Query;

/// The built-in workload query set.
pub fn default_queries() -> Vec<Query> {
    vec![
        Query::new("count_commits", "SELECT count(*) FROM commits"),
        Query::new(
            "count_files",
            "SELECT count(*) FROM commit_files",
        ),
        Query::new(
            "last_commits",
            "SELECT repository_id, commit_author_when FROM commits \
             ORDER BY commit_author_when DESC LIMIT 100",
        ),
        Query::new(
            "commits_per_repo",
            "SELECT repository_id, count(*) FROM commits GROUP BY repository_id",
        ),
        Query::new(
            "join_refs_commits",
            "SELECT r.ref_name, c.commit_hash FROM refs r \
             JOIN commits c ON r.commit_hash = c.commit_hash LIMIT 1000",
        ),
    ]
}

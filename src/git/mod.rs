//! Git context discovery.
//!
//! This module shells out to `git` for everything the engine needs to know
//! about the workspace:
//! - current branch and commit
//! - the base branch an organization indexes against
//! - tracked-file enumeration for initial scans
//! - name-status diffs for delta indexing on feature branches

mod diff;
mod probe;

pub use diff::{parse_name_status, GitDiff};
pub use probe::{
    base_branch, current_branch, current_commit, default_branch_from_remote, diff,
    has_uncommitted, is_base_branch, is_repo, remote_url, tracked_files,
};

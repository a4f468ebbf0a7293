//! Group membership predicate used by `groups="..."` blocks.

use std::collections::HashSet;
use std::fmt::Debug;

pub trait PermissionChecker: Send + Sync + Debug {
    /// `groups` is a comma-separated list; a `!` prefix negates a group.
    fn user_has_groups(&self, groups: &str) -> bool;
}

/// Grants every group check. Negated groups are still refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn user_has_groups(&self, groups: &str) -> bool {
        !split_groups(groups).any(|g| g.starts_with('!'))
    }
}

/// A fixed set of groups the current user belongs to.
#[derive(Debug, Default, Clone)]
pub struct StaticGroups {
    groups: HashSet<String>,
}

impl StaticGroups {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionChecker for StaticGroups {
    fn user_has_groups(&self, groups: &str) -> bool {
        let mut positives = 0;
        let mut matched = false;
        for group in split_groups(groups) {
            if let Some(negated) = group.strip_prefix('!') {
                if self.groups.contains(negated) {
                    return false;
                }
            } else {
                positives += 1;
                matched |= self.groups.contains(group);
            }
        }
        matched || positives == 0
    }
}

fn split_groups(groups: &str) -> impl Iterator<Item = &str> {
    groups.split(',').map(str::trim).filter(|g| !g.is_empty())
}

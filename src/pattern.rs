use std::fmt::{Display, Formatter};
use serde::{Serialize, Serializer};
use thiserror::Error;

const REFS_PREFIX: &str = "refs/";
const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";
const WILDCARD: char = '*';

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("pattern is empty")]
    Empty,

    #[error("pattern '{0}': wildcard is only allowed as the last character")]
    MisplacedWildcard(String),

    #[error("pattern '{0}': only refs/heads/ and refs/tags/ can be matched")]
    UnsupportedRef(String),
}

/// A git reference as reported by the workflow engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GitRef<'a> {
    Branch(&'a str),
    Tag(&'a str),
    /// Pull request merge refs and anything else under `refs/`.
    Other(&'a str),
}

impl<'a> GitRef<'a> {
    pub fn parse(git_ref: &'a str) -> Self {
        if let Some(branch) = git_ref.strip_prefix(HEADS_PREFIX) {
            GitRef::Branch(branch)
        } else if let Some(tag) = git_ref.strip_prefix(TAGS_PREFIX) {
            GitRef::Tag(tag)
        } else if git_ref.starts_with(REFS_PREFIX) {
            GitRef::Other(git_ref)
        } else {
            GitRef::Branch(git_ref)
        }
    }
}

/// Matching tiers, tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ExactBranch,
    PrefixBranch,
    Tag,
}

impl Tier {
    pub const ORDER: [Tier; 3] = [Tier::ExactBranch, Tier::PrefixBranch, Tier::Tag];
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Tier::ExactBranch => "exact branch",
            Tier::PrefixBranch => "branch prefix",
            Tier::Tag => "tag",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// `develop`, `refs/heads/main`
    ExactBranch(String),
    /// `release/*`
    PrefixBranch(String),
    /// `refs/tags/v1.0.0`
    ExactTag(String),
    /// `refs/tags/*`, `refs/tags/v2*`
    PrefixTag(String),
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::Empty);
        }

        let (is_tag, body) = match (pattern.strip_prefix(TAGS_PREFIX), pattern.strip_prefix(HEADS_PREFIX)) {
            (Some(tag), _) => (true, tag),
            (None, Some(branch)) => (false, branch),
            // Anything else under refs/ parses as GitRef::Other and could never match.
            (None, None) if pattern.starts_with(REFS_PREFIX) => {
                return Err(Error::UnsupportedRef(pattern.to_string()))
            }
            (None, None) => (false, pattern),
        };

        let (is_prefix, body) = match body.strip_suffix(WILDCARD) {
            Some(prefix) => (true, prefix),
            None => (false, body),
        };

        if body.contains(WILDCARD) {
            return Err(Error::MisplacedWildcard(pattern.to_string()));
        }
        // A bare `*` would swallow every branch. `refs/tags/*` is fine.
        if body.is_empty() && !(is_tag && is_prefix) {
            return Err(Error::Empty);
        }

        let body = body.to_string();
        Ok(match (is_tag, is_prefix) {
            (false, false) => Pattern::ExactBranch(body),
            (false, true) => Pattern::PrefixBranch(body),
            (true, false) => Pattern::ExactTag(body),
            (true, true) => Pattern::PrefixTag(body),
        })
    }

    pub fn tier(&self) -> Tier {
        match self {
            Pattern::ExactBranch(_) => Tier::ExactBranch,
            Pattern::PrefixBranch(_) => Tier::PrefixBranch,
            Pattern::ExactTag(_) | Pattern::PrefixTag(_) => Tier::Tag,
        }
    }

    pub fn matches(&self, git_ref: &GitRef) -> bool {
        match (self, git_ref) {
            (Pattern::ExactBranch(p), GitRef::Branch(b)) => p == b,
            (Pattern::PrefixBranch(p), GitRef::Branch(b)) => b.starts_with(p.as_str()),
            (Pattern::ExactTag(p), GitRef::Tag(t)) => p == t,
            (Pattern::PrefixTag(p), GitRef::Tag(t)) => t.starts_with(p.as_str()),
            _ => false,
        }
    }

    /// Whether some ref could be matched by both patterns within the same tier.
    pub fn overlaps(&self, other: &Pattern) -> bool {
        use Pattern::*;
        match (self, other) {
            (ExactBranch(a), ExactBranch(b)) | (ExactTag(a), ExactTag(b)) => a == b,
            (PrefixBranch(a), PrefixBranch(b)) | (PrefixTag(a), PrefixTag(b)) => {
                a.starts_with(b.as_str()) || b.starts_with(a.as_str())
            }
            (ExactTag(exact), PrefixTag(prefix)) | (PrefixTag(prefix), ExactTag(exact)) => {
                exact.starts_with(prefix.as_str())
            }
            _ => false,
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::ExactBranch(b) => write!(f, "{b}"),
            Pattern::PrefixBranch(b) => write!(f, "{b}{WILDCARD}"),
            Pattern::ExactTag(t) => write!(f, "{TAGS_PREFIX}{t}"),
            Pattern::PrefixTag(t) => write!(f, "{TAGS_PREFIX}{t}{WILDCARD}"),
        }
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

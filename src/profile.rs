use std::collections::HashSet;
use serde::Serialize;
use thiserror::Error;
use crate::pattern::{GitRef, Pattern, Tier};

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("no environments configured")]
    Empty,

    #[error("environment names and aliases must not be empty")]
    EmptyName,

    #[error("environment name or alias '{0}' is used more than once")]
    DuplicateName(String),

    #[error("environment '{0}' has no branch patterns")]
    NoPatterns(String),

    #[error("environment '{profile}': invalid secret key '{key}'")]
    InvalidSecretKey { profile: String, key: String },

    #[error("pattern '{first_pattern}' of '{first}' overlaps with '{second_pattern}' of '{second}'")]
    OverlappingPatterns {
        first: String,
        first_pattern: String,
        second: String,
        second_pattern: String,
    },
}

/// A deployment target. Infrastructure coordinates are never part of a profile,
/// only the names of the secrets that hold them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentProfile {
    pub name: String,
    pub aliases: Vec<String>,
    pub branch_patterns: Vec<Pattern>,
    pub cluster_secret_key: String,
    pub resource_group_secret_key: String,
    pub creates_release: bool,
    /// Production tier. Overrides into this environment must carry notes.
    pub production: bool,
}

impl EnvironmentProfile {
    /// Names this profile answers to, canonical name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.names().any(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Outcome of matching a ref against the table.
#[derive(Debug, PartialEq)]
pub enum RefMatch<'a> {
    Matched { profile: &'a EnvironmentProfile, tier: Tier },
    Ambiguous { tier: Tier, candidates: Vec<String> },
    NoMatch,
}

/// Read-only table of environment profiles, checked for disjoint patterns on construction.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ProfileTable {
    profiles: Vec<EnvironmentProfile>,
}

impl ProfileTable {
    pub fn new(profiles: Vec<EnvironmentProfile>) -> Result<Self, Error> {
        if profiles.is_empty() {
            return Err(Error::Empty);
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            for name in profile.names() {
                if name.is_empty() {
                    return Err(Error::EmptyName);
                }
                if !seen.insert(name.to_ascii_lowercase()) {
                    return Err(Error::DuplicateName(name.to_string()));
                }
            }
            if profile.branch_patterns.is_empty() {
                return Err(Error::NoPatterns(profile.name.clone()));
            }
            for key in [&profile.cluster_secret_key, &profile.resource_group_secret_key] {
                if !is_valid_secret_key(key) {
                    return Err(Error::InvalidSecretKey {
                        profile: profile.name.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        for (i, first) in profiles.iter().enumerate() {
            for second in &profiles[i + 1..] {
                for a in &first.branch_patterns {
                    if let Some(b) = second.branch_patterns.iter().find(|b| a.overlaps(b)) {
                        return Err(Error::OverlappingPatterns {
                            first: first.name.clone(),
                            first_pattern: a.to_string(),
                            second: second.name.clone(),
                            second_pattern: b.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { profiles })
    }

    /// Skips validation, for exercising the runtime ambiguity path.
    #[cfg(test)]
    pub(crate) fn unchecked(profiles: Vec<EnvironmentProfile>) -> Self {
        Self { profiles }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentProfile> {
        self.profiles.iter()
    }

    /// Look up a profile by name or alias, ignoring ASCII case.
    pub fn by_name(&self, name: &str) -> Option<&EnvironmentProfile> {
        self.profiles.iter().find(|p| p.answers_to(name))
    }

    /// Match a ref tier by tier: exact branches, then branch prefixes, then tags.
    /// The first tier with any hit decides.
    pub fn match_ref(&self, git_ref: &str) -> RefMatch<'_> {
        let parsed = GitRef::parse(git_ref);

        for tier in Tier::ORDER {
            let hits: Vec<&EnvironmentProfile> = self
                .profiles
                .iter()
                .filter(|profile| {
                    profile
                        .branch_patterns
                        .iter()
                        .any(|pattern| pattern.tier() == tier && pattern.matches(&parsed))
                })
                .collect();

            match hits.as_slice() {
                [] => continue,
                [profile] => return RefMatch::Matched { profile: *profile, tier },
                _ => {
                    return RefMatch::Ambiguous {
                        tier,
                        candidates: hits.iter().map(|p| p.name.clone()).collect(),
                    }
                }
            }
        }

        RefMatch::NoMatch
    }
}

fn is_valid_secret_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

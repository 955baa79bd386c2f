//! Profile reconciliation and database selection.
//!
//! Profiles come in two categories: ordinary feature profiles, which can be
//! enabled freely, and the two reserved database profiles ("mongodb" and
//! "postgres"), of which at most one may ever be active for a project. The
//! reconciler merges persisted profiles with newly requested ones on every
//! `start`; the selector picks the single database engine at bootstrap.

use crate::error::{ConduitError, Result};
use std::collections::HashSet;

/// Reserved database-engine profile names. These are always blocked from the
/// ordinary profile set regardless of which engine, if either, is active.
pub const RESERVED_DATABASE_PROFILES: [&str; 2] = ["postgres", "mongodb"];

/// The closed set of supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Database {
    Mongodb,
    Postgres,
}

impl Database {
    /// The profile name this engine is selected by.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mongodb => "mongodb",
            Self::Postgres => "postgres",
        }
    }

    /// The in-container data directory this engine persists to.
    pub fn data_dir(&self) -> &'static str {
        match self {
            Self::Mongodb => "/data/db",
            Self::Postgres => "/var/lib/postgresql/data",
        }
    }

    /// The `{{...}}` variable name holding this engine's generated password.
    pub fn password_variable(&self) -> &'static str {
        match self {
            Self::Mongodb => "MongoPassword",
            Self::Postgres => "PostgresPassword",
        }
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scan a requested profile list for the reserved database names.
///
/// Returns the single selected engine, `None` when no database profile was
/// requested, or a `Configuration` error when two distinct engines were
/// requested at once. This is a pure pre-condition gate: it runs before any
/// network call so a configuration mistake is caught without side effects.
pub fn select_database(profiles: &[String]) -> Result<Option<Database>> {
    let mut selected = None;
    for profile in profiles {
        let db = match profile.as_str() {
            "mongodb" => Database::Mongodb,
            "postgres" => Database::Postgres,
            _ => continue,
        };
        match selected {
            None => selected = Some(db),
            Some(prev) if prev == db => {}
            Some(_) => {
                return Err(ConduitError::configuration(
                    "cannot use multiple database profiles",
                ))
            }
        }
    }
    Ok(selected)
}

/// Remove every blocked name from `requested`, preserving request order.
///
/// Duplicates in the input are collapsed; the output never contains a
/// blocked name or a repeated entry.
pub fn block_profiles(requested: &[String], blocked: &[String]) -> Vec<String> {
    let blocked: HashSet<&str> = blocked
        .iter()
        .map(String::as_str)
        .chain(RESERVED_DATABASE_PROFILES)
        .collect();

    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|p| !blocked.contains(p.as_str()) && seen.insert(p.as_str()))
        .cloned()
        .collect()
}

/// Compute the profile set to apply for a `start` on an existing project.
///
/// The blocklist is the persisted set plus the reserved database names; the
/// result is the persisted profiles followed by the surviving new ones, in
/// that order. Persisted-first ordering is externally observable (it drives
/// labeling and log ordering downstream) so insertion order is preserved
/// rather than resorted.
pub fn reconcile(persisted: &[String], requested: &[String]) -> Vec<String> {
    let new_profiles = block_profiles(requested, persisted);
    let mut updated = persisted.to_vec();
    updated.extend(new_profiles);
    updated
}

//! Resolve a user-typed package reference to exactly one package id.
//!
//! Precedence: `@N` direct index, then case-insensitive substring match,
//! then prefix narrowing, then an ambiguity report listing the candidates.
//! `@N` is an explicit positional reference and never falls back to
//! substring matching.

use thiserror::Error;

use crate::api::PackageSummary;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no packages available")]
    EmptyList,
    #[error("'@{0}' is not a valid package index")]
    BadIndex(String),
    #[error("package index {index} is out of range (only {available} packages listed)")]
    IndexOutOfRange { index: usize, available: usize },
    #[error("no package matches '{0}'")]
    NoMatch(String),
    #[error("reference matches more than one package: {candidates}")]
    Ambiguous { candidates: String },
}

/// Map `query` onto one of `packages` (ordered most-recent-first, so `@0`
/// is the newest package).
pub fn resolve_package<'a>(
    query: &str,
    packages: &'a [PackageSummary],
) -> Result<&'a str, ResolveError> {
    if let Some(index) = query.strip_prefix('@') {
        if packages.is_empty() {
            return Err(ResolveError::EmptyList);
        }
        let index: usize = index
            .parse()
            .map_err(|_| ResolveError::BadIndex(index.to_string()))?;
        return packages
            .get(index)
            .map(|package| package.package_id.as_str())
            .ok_or(ResolveError::IndexOutOfRange {
                index,
                available: packages.len(),
            });
    }

    let needle = query.to_lowercase();
    let matches: Vec<&PackageSummary> = packages
        .iter()
        .filter(|package| package.package_id.to_lowercase().contains(&needle))
        .collect();
    match matches.as_slice() {
        [] => Err(ResolveError::NoMatch(query.to_string())),
        [only] => Ok(only.package_id.as_str()),
        _ => {
            let narrowed: Vec<&PackageSummary> = matches
                .iter()
                .copied()
                .filter(|package| package.package_id.to_lowercase().starts_with(&needle))
                .collect();
            if let [only] = narrowed.as_slice() {
                return Ok(only.package_id.as_str());
            }
            let candidates = if narrowed.is_empty() { matches } else { narrowed };
            Err(ResolveError::Ambiguous {
                candidates: candidates
                    .iter()
                    .map(|package| format!("'{}'", package.package_id))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }
}

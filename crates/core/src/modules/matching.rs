//! Overlay key resolution for a module type
//!
//! Keys are tried as the full type name, then the bare type name, then as
//! `*` patterns ranked by [`Specificity`]. All comparisons ignore case.

use crate::config::{ConfigurationOverlay, MemberOverrides};
use crate::modules::ModuleType;
use std::cmp::Ordering;

/// Wildcard character in overlay module keys
pub const WILDCARD: char = '*';

/// How an overlay key matched a module type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    FullName,
    ShortName,
    Wildcard(Specificity),
}

/// Ranking of a matching wildcard pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specificity {
    pub literals: usize,
    pub wildcards: usize,
}

impl Specificity {
    pub fn of(pattern: &str) -> Self {
        let wildcards = pattern.chars().filter(|c| *c == WILDCARD).count();
        Self {
            literals: pattern.chars().count() - wildcards,
            wildcards,
        }
    }
}

impl Ord for Specificity {
    /// More literal characters rank higher, then fewer wildcards
    fn cmp(&self, other: &Self) -> Ordering {
        self.literals
            .cmp(&other.literals)
            .then_with(|| other.wildcards.cmp(&self.wildcards))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The overlay bucket selected for a module
#[derive(Debug, Clone, Copy)]
pub struct OverlayMatch<'a> {
    pub key: &'a str,
    pub kind: MatchKind,
    pub members: &'a MemberOverrides,
}

/// Check if a key is a usable wildcard pattern
pub fn is_pattern(key: &str) -> bool {
    key.contains(WILDCARD) && key.chars().count() > 1
}

/// Glob-style match where `*` stands for zero or more characters
pub fn wildcard_match(pattern: &str, target: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let target = target.to_ascii_lowercase();

    let segments: Vec<&str> = pattern.split(WILDCARD).collect();
    if segments.len() == 1 {
        return pattern == target;
    }

    let (first, rest) = match segments.split_first() {
        Some((first, rest)) => (*first, rest),
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some((last, middle)) => (*last, middle),
        None => return false,
    };

    if !target.starts_with(first) {
        return false;
    }
    let mut remaining = &target[first.len()..];

    for segment in middle.iter().copied().filter(|segment| !segment.is_empty()) {
        match remaining.find(segment) {
            Some(position) => remaining = &remaining[position + segment.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}

/// Select the overlay bucket that applies to `module_type`, if any
pub fn resolve<'a>(overlay: &'a ConfigurationOverlay, module_type: &ModuleType) -> Option<OverlayMatch<'a>> {
    if let Some((key, members)) = overlay.get_key_value(module_type.full_name()) {
        return Some(OverlayMatch {
            key,
            kind: MatchKind::FullName,
            members,
        });
    }

    if let Some((key, members)) = overlay.get_key_value(module_type.name()) {
        return Some(OverlayMatch {
            key,
            kind: MatchKind::ShortName,
            members,
        });
    }

    let mut best: Option<(Specificity, &'a str, &'a MemberOverrides)> = None;
    for (key, members) in overlay.iter() {
        if !is_pattern(key) || !wildcard_match(key, module_type.full_name()) {
            continue;
        }
        let specificity = Specificity::of(key);
        tracing::debug!(
            "Pattern '{}' matches {} ({} literals, {} wildcards)",
            key,
            module_type.full_name(),
            specificity.literals,
            specificity.wildcards
        );
        if best.map_or(true, |(current, _, _)| specificity > current) {
            best = Some((specificity, key, members));
        }
    }

    best.map(|(specificity, key, members)| OverlayMatch {
        key,
        kind: MatchKind::Wildcard(specificity),
        members,
    })
}

//! Duplicate variable detection and forced disambiguation.
//!
//! Variable paths (`Act.Main[.Sub]`) collide when they share a *tail*: the last
//! two dot-segments, or the whole path when it has fewer. Colliding paths read
//! the same to an author ("DateOfBirth Day" could be either act's slot), so a
//! rule description that mentions such a tail has to be pinned to one path
//! before a script is generated.
//!
//! ```text
//! universe ── find_duplicate_groups ──▶ [DuplicateGroup { tail, options }]
//!                                              │
//! description ── relevant_groups ──────────────┤
//!                                              ▼
//! PreferenceMap ── unresolved_groups ──▶ groups the author must choose in
//! ```
//!
//! Groups are recomputed from the universe on demand and never persisted; only
//! the chosen paths in the session's `PreferenceMap` survive.

use crate::error::DisambiguationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Two or more full variable paths sharing a tail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub tail: String,
    pub options: Vec<String>,
}

impl DuplicateGroup {
    /// The tail as a phrase: its last two segments joined by a space.
    pub fn spoken_tail(&self) -> String {
        let segments: Vec<&str> = self.tail.split('.').collect();
        let start = segments.len().saturating_sub(2);
        segments[start..].join(" ")
    }

    /// True when `description` mentions this group's tail (case-insensitive).
    pub fn is_mentioned_in(&self, description: &str) -> bool {
        let haystack = description.to_lowercase();
        haystack.contains(&self.spoken_tail().to_lowercase()) || haystack.contains(&self.tail.to_lowercase())
    }
}

/// Collision key of a variable path.
pub fn tail_of(path: &str) -> &str {
    match path.rmatch_indices('.').nth(1) {
        Some((idx, _)) => &path[idx + 1..],
        None => path,
    }
}

/// Group `variables` by tail; one group per tail with at least two distinct paths.
///
/// Groups come out in order of their first path's appearance, options in
/// first-seen order.
pub fn find_duplicate_groups(variables: &[String]) -> Vec<DuplicateGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_tail: HashMap<&str, Vec<&str>> = HashMap::new();

    for path in variables {
        let tail = tail_of(path);
        let options = by_tail.entry(tail).or_insert_with(|| {
            order.push(tail);
            Vec::new()
        });
        if !options.contains(&path.as_str()) {
            options.push(path);
        }
    }

    order
        .into_iter()
        .filter_map(|tail| {
            let options = by_tail.remove(tail)?;
            (options.len() >= 2).then(|| DuplicateGroup {
                tail: tail.to_string(),
                options: options.into_iter().map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Groups whose tail the description mentions.
pub fn relevant_groups<'g>(groups: &'g [DuplicateGroup], description: &str) -> Vec<&'g DuplicateGroup> {
    groups.iter().filter(|g| g.is_mentioned_in(description)).collect()
}

/// The author's chosen path per tail, owned by one authoring session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceMap {
    chosen: BTreeMap<String, String>,
}

impl PreferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as the choice for `group`.
    pub fn choose(&mut self, group: &DuplicateGroup, path: &str) -> Result<(), DisambiguationError> {
        if !group.options.iter().any(|o| o == path) {
            return Err(DisambiguationError::UnknownOption { tail: group.tail.clone(), option: path.to_string() });
        }
        self.chosen.insert(group.tail.clone(), path.to_string());
        Ok(())
    }

    pub fn chosen(&self, tail: &str) -> Option<&str> {
        self.chosen.get(tail).map(String::as_str)
    }

    /// A group is resolved once the map holds one of its options.
    pub fn is_resolved(&self, group: &DuplicateGroup) -> bool {
        self.chosen(&group.tail).is_some_and(|c| group.options.iter().any(|o| o == c))
    }

    pub fn clear(&mut self) {
        self.chosen.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.chosen.iter().map(|(t, p)| (t.as_str(), p.as_str()))
    }
}

/// Relevant groups still lacking a valid choice. Generation must not proceed
/// while this is non-empty.
pub fn unresolved_groups(groups: &[DuplicateGroup], description: &str, prefs: &PreferenceMap) -> Vec<DuplicateGroup> {
    relevant_groups(groups, description).into_iter().filter(|g| !prefs.is_resolved(g)).cloned().collect()
}

/// Allow-list for the generator: non-chosen options of resolved groups removed.
pub fn apply_preferences(variables: &[String], groups: &[DuplicateGroup], prefs: &PreferenceMap) -> Vec<String> {
    variables
        .iter()
        .filter(|path| {
            groups.iter().filter(|g| prefs.is_resolved(g)).all(|g| {
                !g.options.iter().any(|o| o == *path) || prefs.chosen(&g.tail) == Some(path.as_str())
            })
        })
        .cloned()
        .collect()
}

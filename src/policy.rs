// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::FilterConfig;
use std::collections::HashSet;

/// The static admission lists, loaded once and never modified.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    name_whitelist: Vec<String>,
    name_blacklist: Vec<String>,
    category_whitelist: HashSet<String>,
}

impl Policy {
    pub fn from_config(config: &FilterConfig) -> Self {
        let name_whitelist = normalize(&config.whitelist, true);
        let name_blacklist = normalize(&config.blacklist, true);
        let category_whitelist = normalize(&config.whitelist_category, false)
            .into_iter()
            .collect();

        Self {
            name_whitelist,
            name_blacklist,
            category_whitelist,
        }
    }

    /// True if the name matches the whitelist (or there is no whitelist), or
    /// the category has already been admitted.
    pub fn is_stream_admitted(
        &self,
        name: &str,
        category_id: Option<&str>,
        discovered: &DiscoveredCategories,
    ) -> bool {
        let lowered = name.to_lowercase();
        let name_admitted = self.name_whitelist.is_empty()
            || self
                .name_whitelist
                .iter()
                .any(|entry| lowered.contains(entry.as_str()));

        name_admitted || category_id.is_some_and(|id| discovered.contains(id))
    }

    pub fn is_stream_blocked(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.name_blacklist
            .iter()
            .any(|entry| lowered.contains(entry.as_str()))
    }

    /// A fresh discovered set containing only the static category whitelist.
    pub fn seed_categories(&self) -> DiscoveredCategories {
        DiscoveredCategories {
            ids: self.category_whitelist.clone(),
        }
    }

    pub fn name_whitelist(&self) -> &[String] {
        &self.name_whitelist
    }

    pub fn name_blacklist(&self) -> &[String] {
        &self.name_blacklist
    }

    pub fn category_whitelist(&self) -> &HashSet<String> {
        &self.category_whitelist
    }
}

fn normalize(entries: &[String], fold_case: bool) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if fold_case {
                entry.to_lowercase()
            } else {
                entry.to_string()
            }
        })
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

/// Category ids unlocked by admitted streams. Only grows; membership is all
/// that matters so it is stored as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredCategories {
    ids: HashSet<String>,
}

impl DiscoveredCategories {
    pub fn record_admission(&mut self, category_id: &str) {
        if !self.ids.contains(category_id) {
            self.ids.insert(category_id.to_string());
        }
    }

    pub fn contains(&self, category_id: &str) -> bool {
        self.ids.contains(category_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DiscoveredCategories {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

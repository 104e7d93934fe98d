// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Stream and category filtering for one refresh cycle.
//!
//! Category visibility depends on which streams survived, so a cycle is
//! split into two passes. [`StreamPass`] filters every stream list and grows
//! its discovered category set as it goes; [`StreamPass::finish`] hands that
//! set to a [`CategoryPass`], which is the only way to filter categories.
//! Filtering categories before all streams are done does not type-check.

use crate::policy::{DiscoveredCategories, Policy};
use crate::xtream_api::{CategoryRecord, StreamRecord};
use tracing::debug;

#[derive(Debug)]
pub struct StreamPass<'a> {
    policy: &'a Policy,
    discovered: DiscoveredCategories,
    kept: usize,
    dropped: usize,
}

impl<'a> StreamPass<'a> {
    /// `seed` is the discovered set the cycle starts from: either the static
    /// category whitelist or the set left by the previous cycle.
    pub fn new(policy: &'a Policy, seed: DiscoveredCategories) -> Self {
        Self {
            policy,
            discovered: seed,
            kept: 0,
            dropped: 0,
        }
    }

    /// Keeps admitted, non-blocked streams in input order and records the
    /// category of every kept stream. A stream whose category was unlocked by
    /// an earlier stream (in this list or a previous one) is admitted even if
    /// its name matches nothing.
    pub fn filter_streams(&mut self, records: Vec<StreamRecord>) -> Vec<StreamRecord> {
        let total = records.len();
        let mut kept = Vec::with_capacity(total);

        for record in records {
            let admitted = self.policy.is_stream_admitted(
                record.name(),
                record.category_id(),
                &self.discovered,
            ) && !self.policy.is_stream_blocked(record.name());

            if !admitted {
                continue;
            }

            if let Some(category_id) = record.category_id() {
                self.discovered.record_admission(category_id);
            }
            kept.push(record);
        }

        self.kept += kept.len();
        self.dropped += total - kept.len();
        debug!(
            "Kept {} of {} streams ({} categories discovered)",
            kept.len(),
            total,
            self.discovered.len()
        );
        kept
    }

    pub fn discovered(&self) -> &DiscoveredCategories {
        &self.discovered
    }

    pub fn finish(self) -> CategoryPass {
        CategoryPass {
            discovered: self.discovered,
            streams_kept: self.kept,
            streams_dropped: self.dropped,
        }
    }
}

#[derive(Debug)]
pub struct CategoryPass {
    discovered: DiscoveredCategories,
    streams_kept: usize,
    streams_dropped: usize,
}

impl CategoryPass {
    pub fn filter_categories(&self, records: Vec<CategoryRecord>) -> Vec<CategoryRecord> {
        filter_categories(records, &self.discovered)
    }

    pub fn streams_kept(&self) -> usize {
        self.streams_kept
    }

    pub fn streams_dropped(&self) -> usize {
        self.streams_dropped
    }

    pub fn into_discovered(self) -> DiscoveredCategories {
        self.discovered
    }
}

/// Keeps categories present in `discovered`, in input order. An empty set
/// means nothing was admitted by category, so every category is kept.
pub fn filter_categories(
    records: Vec<CategoryRecord>,
    discovered: &DiscoveredCategories,
) -> Vec<CategoryRecord> {
    if discovered.is_empty() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| record.category_id().is_some_and(|id| discovered.contains(id)))
        .collect()
}

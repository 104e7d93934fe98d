// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::Config;
use crate::error::UpstreamFetchError;
use crate::filter::StreamPass;
use crate::policy::{DiscoveredCategories, Policy};
use crate::xtream_api::{
    CatalogAction, CatalogKind, CategoryRecord, REFRESH_ORDER, StreamRecord, XTreamAPI,
    redact_server_info,
};
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Stale,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub interval: Duration,
    pub reset_discovered: bool,
}

impl RefreshOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.proxy.refresh_interval(),
            reset_discovered: config.proxy.reset_discovered_each_refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCount {
    pub action: CatalogAction,
    pub kept: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub refreshed_at: DateTime<Utc>,
    pub counts: Vec<ActionCount>,
    pub discovered_categories: usize,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// The cache was fresh, or a concurrent caller just refreshed it.
    Skipped,
    Refreshed(RefreshSummary),
}

#[derive(Debug)]
struct Snapshot {
    entries: HashMap<CatalogAction, Arc<Value>>,
    last_refresh: Option<DateTime<Utc>>,
    state: CacheState,
}

// Result of one successful fetch-and-filter pass, committed all at once.
struct Cycle {
    entries: HashMap<CatalogAction, Arc<Value>>,
    counts: Vec<ActionCount>,
    discovered: DiscoveredCategories,
}

/// Filtered catalog cache, refreshed lazily by whoever asks first once the
/// interval has elapsed. Clones share the same cache.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    api: XTreamAPI,
    policy: Policy,
    refresh_interval: TimeDelta,
    reset_discovered: bool,
    snapshot: RwLock<Snapshot>,
    // Held for the whole refresh; the discovered set is only touched under it.
    discovered: Mutex<DiscoveredCategories>,
    attempts: AtomicU64,
}

impl CacheManager {
    pub fn new(api: XTreamAPI, policy: Policy, options: RefreshOptions) -> Self {
        let discovered = policy.seed_categories();
        let inner = Inner {
            api,
            policy,
            refresh_interval: TimeDelta::from_std(options.interval).unwrap_or(TimeDelta::MAX),
            reset_discovered: options.reset_discovered,
            snapshot: RwLock::new(Snapshot {
                entries: HashMap::new(),
                last_refresh: None,
                state: CacheState::Stale,
            }),
            discovered: Mutex::new(discovered),
            attempts: AtomicU64::new(0),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api = XTreamAPI::new(&config.upstream)?;
        let policy = Policy::from_config(&config.filter);
        Ok(Self::new(api, policy, RefreshOptions::from_config(config)))
    }

    pub fn api(&self) -> &XTreamAPI {
        &self.inner.api
    }

    pub async fn state(&self) -> CacheState {
        self.inner.snapshot.read().await.state
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.read().await.last_refresh
    }

    pub async fn discovered_categories(&self) -> DiscoveredCategories {
        self.inner.discovered.lock().await.clone()
    }

    /// Refreshes the cache if it is stale or the interval has elapsed.
    ///
    /// Only one refresh runs at a time. Callers that queue behind a running
    /// refresh reuse its result instead of fetching again. On failure the
    /// previous contents stay readable and the cache is marked stale so the
    /// next call retries.
    ///
    /// The refresh runs on its own task: dropping the returned future stops
    /// the wait, not the refresh.
    pub async fn maybe_refresh(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, UpstreamFetchError> {
        if !self.inner.needs_refresh(now).await {
            return Ok(RefreshOutcome::Skipped);
        }

        let seen_attempts = self.inner.attempts.load(Ordering::Acquire);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.refresh(now, seen_attempts).await });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(UpstreamFetchError::Interrupted(e)),
        }
    }

    /// The cached payload for `action`: an empty object for `server_info`
    /// and an empty list for catalog actions that were never populated.
    pub async fn lookup(&self, action: CatalogAction) -> Arc<Value> {
        let snapshot = self.inner.snapshot.read().await;
        match snapshot.entries.get(&action) {
            Some(value) => Arc::clone(value),
            None => Arc::new(empty_payload(action)),
        }
    }
}

impl Inner {
    async fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let snapshot = self.snapshot.read().await;
        match (snapshot.state, snapshot.last_refresh) {
            (CacheState::Fresh, Some(last)) => {
                now.signed_duration_since(last) >= self.refresh_interval
            }
            _ => true,
        }
    }

    async fn refresh(
        &self,
        now: DateTime<Utc>,
        seen_attempts: u64,
    ) -> Result<RefreshOutcome, UpstreamFetchError> {
        let mut discovered = self.discovered.lock().await;

        if self.attempts.load(Ordering::Acquire) != seen_attempts || !self.needs_refresh(now).await
        {
            debug!("Refresh already performed by a concurrent request");
            return Ok(RefreshOutcome::Skipped);
        }

        let seed = if self.reset_discovered {
            self.policy.seed_categories()
        } else {
            discovered.clone()
        };

        let result = self.fetch_and_filter(seed).await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(cycle) => {
                let summary = RefreshSummary {
                    refreshed_at: now,
                    counts: cycle.counts,
                    discovered_categories: cycle.discovered.len(),
                };
                *discovered = cycle.discovered;

                let mut snapshot = self.snapshot.write().await;
                snapshot.entries = cycle.entries;
                snapshot.last_refresh = Some(now);
                snapshot.state = CacheState::Fresh;

                info!(
                    "Cache refreshed: {} ({} categories discovered)",
                    summary
                        .counts
                        .iter()
                        .map(|c| format!("{} {}/{}", c.action, c.kept, c.total))
                        .collect::<Vec<_>>()
                        .join(", "),
                    summary.discovered_categories
                );
                Ok(RefreshOutcome::Refreshed(summary))
            }
            Err(e) => {
                self.snapshot.write().await.state = CacheState::Stale;
                warn!("Cache refresh abandoned, keeping previous contents: {}", e);
                Err(e)
            }
        }
    }

    async fn fetch_and_filter(
        &self,
        seed: DiscoveredCategories,
    ) -> Result<Cycle, UpstreamFetchError> {
        let mut entries = HashMap::new();
        let mut counts = Vec::new();

        let server_info = self.api.get_server_info().await?;
        entries.insert(
            CatalogAction::ServerInfo,
            Arc::new(redact_server_info(server_info)),
        );

        let mut streams = StreamPass::new(&self.policy, seed);
        for action in actions_of(CatalogKind::Streams) {
            let records = self.api.get_streams(action).await?;
            let total = records.len();
            let kept = streams.filter_streams(records);
            counts.push(ActionCount {
                action,
                kept: kept.len(),
                total,
            });
            let list = kept.into_iter().map(StreamRecord::into_raw).collect();
            entries.insert(action, Arc::new(Value::Array(list)));
        }

        let categories = streams.finish();
        for action in actions_of(CatalogKind::Categories) {
            let records = self.api.get_categories(action).await?;
            let total = records.len();
            let kept = categories.filter_categories(records);
            counts.push(ActionCount {
                action,
                kept: kept.len(),
                total,
            });
            let list = kept.into_iter().map(CategoryRecord::into_raw).collect();
            entries.insert(action, Arc::new(Value::Array(list)));
        }

        Ok(Cycle {
            entries,
            counts,
            discovered: categories.into_discovered(),
        })
    }
}

fn actions_of(kind: CatalogKind) -> impl Iterator<Item = CatalogAction> {
    REFRESH_ORDER.into_iter().filter(move |a| a.kind() == kind)
}

fn empty_payload(action: CatalogAction) -> Value {
    match action.kind() {
        CatalogKind::ServerInfo => Value::Object(serde_json::Map::new()),
        _ => Value::Array(Vec::new()),
    }
}

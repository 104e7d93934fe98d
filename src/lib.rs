// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod policy;
pub mod server;
pub mod xtream_api;

pub use cache::CacheManager;
pub use config::Config;
pub use error::{ConfigError, UpstreamFetchError};
pub use policy::{DiscoveredCategories, Policy};
pub use xtream_api::XTreamAPI;

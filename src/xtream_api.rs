// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::config::UpstreamConfig;
use crate::error::UpstreamFetchError;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Placeholder written over credential and URL fields of `server_info`.
pub const REDACTED: &str = "********";

/// Catalog actions fetched by a refresh, in the order they are fetched.
/// Stream lists come before category lists.
pub const REFRESH_ORDER: [CatalogAction; 7] = [
    CatalogAction::ServerInfo,
    CatalogAction::LiveStreams,
    CatalogAction::Series,
    CatalogAction::VodStreams,
    CatalogAction::LiveCategories,
    CatalogAction::SeriesCategories,
    CatalogAction::VodCategories,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogAction {
    ServerInfo,
    LiveStreams,
    Series,
    VodStreams,
    LiveCategories,
    SeriesCategories,
    VodCategories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    ServerInfo,
    Streams,
    Categories,
}

impl CatalogAction {
    /// The cache key and upstream `action` value. `server_info` is fetched
    /// without any action parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerInfo => "server_info",
            Self::LiveStreams => "get_live_streams",
            Self::Series => "get_series",
            Self::VodStreams => "get_vod_streams",
            Self::LiveCategories => "get_live_categories",
            Self::SeriesCategories => "get_series_categories",
            Self::VodCategories => "get_vod_categories",
        }
    }

    pub fn from_action(action: &str) -> Option<Self> {
        REFRESH_ORDER
            .iter()
            .copied()
            .find(|a| a.kind() != CatalogKind::ServerInfo && a.as_str() == action)
    }

    pub fn kind(&self) -> CatalogKind {
        match self {
            Self::ServerInfo => CatalogKind::ServerInfo,
            Self::LiveStreams | Self::Series | Self::VodStreams => CatalogKind::Streams,
            Self::LiveCategories | Self::SeriesCategories | Self::VodCategories => {
                CatalogKind::Categories
            }
        }
    }

    fn upstream_action(&self) -> Option<&'static str> {
        match self {
            Self::ServerInfo => None,
            _ => Some(self.as_str()),
        }
    }
}

impl fmt::Display for CatalogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Detail actions that are never cached and go straight to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughAction {
    SeriesInfo,
    VodInfo,
    SimpleDataTable,
}

impl PassthroughAction {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "get_series_info" => Some(Self::SeriesInfo),
            "get_vod_info" => Some(Self::VodInfo),
            "get_simple_data_table" => Some(Self::SimpleDataTable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeriesInfo => "get_series_info",
            Self::VodInfo => "get_vod_info",
            Self::SimpleDataTable => "get_simple_data_table",
        }
    }

    /// Name of the id parameter forwarded with this action.
    pub fn id_param(&self) -> &'static str {
        match self {
            Self::SeriesInfo => "series_id",
            Self::VodInfo => "vod_id",
            Self::SimpleDataTable => "stream_id",
        }
    }
}

// Upstream panels send ids as either strings or numbers.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A stream, series or VOD entry. The upstream JSON is kept verbatim and
/// re-emitted unchanged; only `name` and `category_id` are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    name: String,
    category_id: Option<String>,
    raw: Value,
}

impl StreamRecord {
    pub fn from_value(raw: Value) -> Self {
        let name = raw.get("name").and_then(value_as_string).unwrap_or_default();
        let category_id = raw.get("category_id").and_then(value_as_string);
        Self {
            name,
            category_id,
            raw,
        }
    }

    /// Empty when the upstream record has no usable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    category_id: Option<String>,
    raw: Value,
}

impl CategoryRecord {
    pub fn from_value(raw: Value) -> Self {
        let category_id = raw.get("category_id").and_then(value_as_string);
        Self { category_id, raw }
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category_id.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

impl<'de> Deserialize<'de> for StreamRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl Serialize for StreamRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CategoryRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl Serialize for CategoryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Overwrites the upstream credentials and address in a `server_info`
/// payload so downstream clients never see them.
pub fn redact_server_info(mut info: Value) -> Value {
    const SENSITIVE: [(&str, &[&str]); 2] = [
        ("user_info", &["username", "password"]),
        ("server_info", &["url", "port", "https_port", "rtmp_port"]),
    ];

    for (section, fields) in SENSITIVE {
        if let Some(Value::Object(object)) = info.get_mut(section) {
            for field in fields {
                if let Some(value) = object.get_mut(*field) {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
    }
    info
}

#[derive(Debug, Clone)]
pub struct XTreamAPI {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl XTreamAPI {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.server).with_context(|| "Invalid server URL")?;

        let mut base_url = if let Some(port) = url.port() {
            format!(
                "{}://{}:{}",
                url.scheme(),
                url.host_str().unwrap_or("localhost"),
                port
            )
        } else {
            format!(
                "{}://{}",
                url.scheme(),
                url.host_str().unwrap_or("localhost")
            )
        };

        let path = url.path().trim_end_matches('/');
        let path = path.strip_suffix("/player_api.php").unwrap_or(path);
        base_url.push_str(path.trim_end_matches('/'));

        Ok(Self {
            client: Client::builder()
                .timeout(config.timeout())
                .user_agent(config.user_agent.as_str())
                .build()?,
            base_url,
            username: config.user.clone(),
            password: config.pass.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/player_api.php` with credentials, the optional action and
    /// any extra parameters. Returns the parsed JSON body.
    pub async fn make_request_raw(
        &self,
        action: Option<&str>,
        extra_params: &[(&str, &str)],
    ) -> Result<Value, UpstreamFetchError> {
        let label = action.unwrap_or("server_info").to_string();
        let url = format!("{}/player_api.php", self.base_url);

        let mut params: Vec<(&str, &str)> = vec![
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        if let Some(action) = action {
            params.push(("action", action));
        }
        params.extend_from_slice(extra_params);

        debug!(
            "Requesting: {} (action: {}, extra: {:?})",
            url, label, extra_params
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| UpstreamFetchError::Request {
                action: label.clone(),
                source: source.without_url(),
            })?;

        if !response.status().is_success() {
            return Err(UpstreamFetchError::Status {
                action: label,
                status: response.status(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| UpstreamFetchError::Request {
                action: label.clone(),
                source: source.without_url(),
            })?;

        debug!("Response size for {}: {} bytes", label, body.len());

        serde_json::from_slice(&body).map_err(|source| {
            warn!(
                "JSON parsing error for {} at line {}, column {}: {}",
                label,
                source.line(),
                source.column(),
                source
            );
            UpstreamFetchError::Decode {
                action: label,
                source,
            }
        })
    }

    /// The raw login/server payload, credentials included.
    pub async fn get_server_info(&self) -> Result<Value, UpstreamFetchError> {
        self.make_request_raw(None, &[]).await
    }

    pub async fn get_streams(
        &self,
        action: CatalogAction,
    ) -> Result<Vec<StreamRecord>, UpstreamFetchError> {
        self.get_list(action).await
    }

    pub async fn get_categories(
        &self,
        action: CatalogAction,
    ) -> Result<Vec<CategoryRecord>, UpstreamFetchError> {
        self.get_list(action).await
    }

    async fn get_list<T>(&self, action: CatalogAction) -> Result<Vec<T>, UpstreamFetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self.make_request_raw(action.upstream_action(), &[]).await?;

        // Some panels answer `null` for an empty list.
        let list: Option<Vec<T>> =
            serde_json::from_value(value).map_err(|source| UpstreamFetchError::Decode {
                action: action.to_string(),
                source,
            })?;

        Ok(list.unwrap_or_default())
    }

    /// Forwards a detail request (series/VOD info, catchup table) and
    /// returns the upstream JSON untouched.
    pub async fn get_info(
        &self,
        action: PassthroughAction,
        id: Option<&str>,
    ) -> Result<Value, UpstreamFetchError> {
        let extra: Vec<(&str, &str)> = id.map(|id| (action.id_param(), id)).into_iter().collect();
        self.make_request_raw(Some(action.as_str()), &extra).await
    }

    /// Playback location on the upstream for `/{asset}/{user}/{pass}/{name}`,
    /// with the configured credentials substituted.
    pub fn get_stream_url(&self, asset: &str, name: &str, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(asset),
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password),
            urlencoding::encode(name)
        );

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

//! HTTP implementation of [`super::UpstreamClient`].
//!
//! Adapted from this crate's original Xtream Codes client: a thin
//! `reqwest`-based wrapper with one timeout-configured [`reqwest::Client`]
//! and a helper that turns non-2xx responses into [`UpstreamError`]
//! variants, generalized from a single-purpose authentication call to the
//! full CRUD surface spec.md §6 requires.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::error::UpstreamError;

use super::model::*;
use super::UpstreamClient;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug)]
pub struct HttpUpstreamClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpUpstreamClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, UpstreamError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(UpstreamError::InvalidUrl(base_url.to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(UpstreamError::Network)?;

        Ok(Self {
            http,
            base_url: trimmed.to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        operation: &str,
    ) -> Result<T, UpstreamError> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound {
                kind: "entity",
                id: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                operation: operation.to_string(),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|_| UpstreamError::InvalidResponse(operation.to_string()))
    }

    async fn send_no_body(&self, method: Method, path: &str, operation: &str) -> Result<(), UpstreamError> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound {
                kind: "entity",
                id: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(serde::Deserialize)]
struct PageDto<T> {
    count: i64,
    #[serde(default)]
    #[allow(dead_code)]
    next: Option<String>,
    results: Vec<T>,
}

impl<T> From<PageDto<T>> for Page<T> {
    fn from(p: PageDto<T>) -> Self {
        Page {
            count: p.count,
            results: p.results,
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn list_channels(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
        group: Option<i64>,
    ) -> Result<Page<Channel>, UpstreamError> {
        let mut path = format!("/api/channels/?page={page}&page_size={page_size}");
        if let Some(s) = search {
            path.push_str(&format!("&search={}", urlencoding::encode(s)));
        }
        if let Some(g) = group {
            path.push_str(&format!("&group={g}"));
        }
        let dto: PageDto<Channel> = self.send::<(), _>(Method::GET, &path, None, "list_channels").await?;
        Ok(dto.into())
    }

    async fn get_channel(&self, id: i64) -> Result<Channel, UpstreamError> {
        self.send::<(), _>(Method::GET, &format!("/api/channels/{id}/"), None, "get_channel")
            .await
    }

    async fn create_channel(&self, data: ChannelWrite) -> Result<Channel, UpstreamError> {
        match self
            .send(Method::POST, "/api/channels/", Some(&data), "create_channel")
            .await
        {
            Err(UpstreamError::Status { status, .. }) if status == 400 || status == 409 => {
                Err(UpstreamError::Duplicate {
                    kind: "channel",
                    name: data.name.unwrap_or_default(),
                })
            }
            other => other,
        }
    }

    async fn update_channel(&self, id: i64, data: ChannelWrite) -> Result<Channel, UpstreamError> {
        self.send(
            Method::PATCH,
            &format!("/api/channels/{id}/"),
            Some(&data),
            "update_channel",
        )
        .await
    }

    async fn delete_channel(&self, id: i64) -> Result<(), UpstreamError> {
        self.send_no_body(Method::DELETE, &format!("/api/channels/{id}/"), "delete_channel")
            .await
    }

    async fn assign_channel_numbers(&self, ids: &[i64], starting: i64) -> Result<(), UpstreamError> {
        let body = json!({ "channel_ids": ids, "starting_number": starting });
        self.send::<_, serde_json::Value>(
            Method::POST,
            "/api/channels/assign-numbers/",
            Some(&body),
            "assign_channel_numbers",
        )
        .await
        .map(|_| ())
    }

    async fn list_channel_groups(&self) -> Result<Vec<Group>, UpstreamError> {
        self.send::<(), _>(Method::GET, "/api/channel-groups/", None, "list_channel_groups")
            .await
    }

    async fn create_channel_group(&self, name: &str) -> Result<Group, UpstreamError> {
        let body = json!({ "name": name });
        match self
            .send(Method::POST, "/api/channel-groups/", Some(&body), "create_channel_group")
            .await
        {
            Err(UpstreamError::Status { status, .. }) if status == 400 || status == 409 => {
                Err(UpstreamError::Duplicate {
                    kind: "group",
                    name: name.to_string(),
                })
            }
            other => other,
        }
    }

    async fn update_channel_group(&self, id: i64, name: &str) -> Result<Group, UpstreamError> {
        let body = json!({ "name": name });
        self.send(
            Method::PATCH,
            &format!("/api/channel-groups/{id}/"),
            Some(&body),
            "update_channel_group",
        )
        .await
    }

    async fn delete_channel_group(&self, id: i64) -> Result<(), UpstreamError> {
        self.send_no_body(
            Method::DELETE,
            &format!("/api/channel-groups/{id}/"),
            "delete_channel_group",
        )
        .await
    }

    async fn list_streams(
        &self,
        page: u32,
        page_size: u32,
        provider_id: Option<i64>,
    ) -> Result<Page<Stream>, UpstreamError> {
        let mut path = format!("/api/streams/?page={page}&page_size={page_size}");
        if let Some(p) = provider_id {
            path.push_str(&format!("&provider={p}"));
        }
        let dto: PageDto<Stream> = self.send::<(), _>(Method::GET, &path, None, "list_streams").await?;
        Ok(dto.into())
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, UpstreamError> {
        self.send::<(), _>(Method::GET, "/api/providers/", None, "list_providers")
            .await
    }

    async fn get_provider(&self, id: i64) -> Result<Provider, UpstreamError> {
        self.send::<(), _>(Method::GET, &format!("/api/providers/{id}/"), None, "get_provider")
            .await
    }

    async fn refresh_provider(&self, id: i64) -> Result<(), UpstreamError> {
        self.send_no_body(
            Method::POST,
            &format!("/api/providers/{id}/refresh/"),
            "refresh_provider",
        )
        .await
    }

    async fn create_logo(&self, url: &str) -> Result<i64, UpstreamError> {
        let body = json!({ "url": url });
        #[derive(serde::Deserialize)]
        struct LogoDto {
            id: i64,
        }
        let dto: LogoDto = self
            .send(Method::POST, "/api/logos/", Some(&body), "create_logo")
            .await?;
        Ok(dto.id)
    }

    async fn find_logo_by_url(&self, url: &str) -> Result<Option<i64>, UpstreamError> {
        #[derive(serde::Deserialize)]
        struct LogoDto {
            id: i64,
        }
        let path = format!("/api/logos/?url={}", urlencoding::encode(url));
        let results: Vec<LogoDto> = self.send::<(), _>(Method::GET, &path, None, "find_logo_by_url").await?;
        Ok(results.into_iter().next().map(|l| l.id))
    }

    async fn list_epg_sources(&self) -> Result<Vec<EpgSource>, UpstreamError> {
        self.send::<(), _>(Method::GET, "/api/epg/sources/", None, "list_epg_sources")
            .await
    }

    async fn get_epg_data(&self, source_id: i64) -> Result<Vec<EpgDataEntry>, UpstreamError> {
        self.send::<(), _>(
            Method::GET,
            &format!("/api/epg/sources/{source_id}/data/"),
            None,
            "get_epg_data",
        )
        .await
    }

    async fn get_channel_stats(&self) -> Result<ChannelStatsResponse, UpstreamError> {
        self.send::<(), _>(Method::GET, "/api/channels/stats/", None, "get_channel_stats")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let result = HttpUpstreamClient::new("", None);
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
    }

    #[test]
    fn strips_trailing_slash() {
        let client = HttpUpstreamClient::new("http://upstream:9191/", None).unwrap();
        assert_eq!(client.base_url, "http://upstream:9191");
    }
}

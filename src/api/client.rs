//! Upstream HTTP client
//!
//! Handles communication with the `api.json/0.2` web service. Every request
//! carries the `X-App-Id` header; authenticated requests also carry
//! `X-User-Auth-Token`. Stream URLs are signed with the app secret.

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;

use super::{adapter, dto};
use crate::catalog::{
    CatalogError, CatalogProvider, Collection, CoverSize, Goody, Release, Transport,
    TransportError,
};
use crate::config::Credentials;
use crate::model::{QualityTier, ReleaseKind, ReleaseRef, TrackMeta};

/// Upstream API client
pub struct Client {
    http_client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: Option<String>,
    user_auth_token: Option<String>,
}

const BASE_URL: &str = "https://www.qobuz.com/api.json/0.2";

const USER_AGENT: &str = concat!("release-fetch/", env!("CARGO_PKG_VERSION"));

/// Page size for artist, label and playlist listings.
const PAGE_LIMIT: u32 = 500;

impl Client {
    /// Create a client from stored credentials.
    ///
    /// When no user auth token is stored but an email and password hash are,
    /// logs in to obtain one.
    pub async fn connect(credentials: &Credentials) -> Result<Self, CatalogError> {
        Self::connect_to(BASE_URL, credentials).await
    }

    async fn connect_to(base_url: &str, credentials: &Credentials) -> Result<Self, CatalogError> {
        let app_id = credentials
            .app_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(CatalogError::InvalidAppId)?;

        let mut client = Self::build(base_url, app_id, credentials.app_secret.clone())?;
        client.user_auth_token = credentials.user_auth_token.clone();

        if client.user_auth_token.is_none() {
            if let (Some(email), Some(password_md5)) =
                (&credentials.email, &credentials.password_md5)
            {
                let token = client.login(email, password_md5).await?;
                client.user_auth_token = Some(token);
            }
        }
        Ok(client)
    }

    fn build(
        base_url: &str,
        app_id: String,
        app_secret: Option<String>,
    ) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
            user_auth_token: None,
        })
    }

    /// Create a client for testing with custom base URL
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::build(&base_url.into(), "test-app".to_string(), Some("secret".to_string()))
            .expect("Failed to build HTTP client")
    }

    /// Exchange an email and password hash for a user auth token.
    pub async fn login(&self, email: &str, password_md5: &str) -> Result<String, CatalogError> {
        let params = [
            ("email", email.to_string()),
            ("password", password_md5.to_string()),
            ("app_id", self.app_id.clone()),
        ];
        let login: dto::Login = match self.get("user/login", &params).await {
            Err(CatalogError::Parse(message)) if message.starts_with("HTTP 400") => {
                return Err(CatalogError::InvalidAppId);
            }
            other => other?,
        };
        tracing::info!("Logged in as {}", email);
        Ok(login.user_auth_token)
    }

    /// Send a GET request and parse the response
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%endpoint, "GET");

        let mut request = self
            .http_client
            .get(&url)
            .query(params)
            .header("X-App-Id", &self.app_id);
        if let Some(token) = &self.user_auth_token {
            request = request.header("X-User-Auth-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Unauthorized);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(endpoint.to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited);
        }

        if !status.is_success() {
            // Try to parse error response
            let detail = match response.json::<dto::ApiError>().await {
                Ok(error) => error.message,
                Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
            return Err(CatalogError::Parse(format!("HTTP {}: {}", status.as_u16(), detail)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Walk a paginated listing until every item is collected.
    async fn get_all<R, T>(
        &self,
        endpoint: &str,
        id_param: &str,
        id: &str,
        extra: &str,
        page_of: impl Fn(R) -> (String, Option<dto::Page<T>>),
    ) -> Result<(String, Vec<T>), CatalogError>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut offset = 0u32;

        let name = loop {
            let params = [
                (id_param, id.to_string()),
                ("extra", extra.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ];
            let (name, page) = page_of(self.get::<R>(endpoint, &params).await?);

            let Some(page) = page else { break name };
            let received = page.items.len() as u32;
            let total = page.total;
            items.extend(page.items);
            offset += received;

            let exhausted = received == 0 || total.is_none_or(|t| offset >= t);
            if exhausted {
                break name;
            }
        };

        Ok((name, items))
    }

    /// Ask for a signed stream URL.
    async fn file_url(
        &self,
        track_id: &str,
        tier: QualityTier,
    ) -> Result<dto::FileUrl, TransportError> {
        let secret = self.app_secret.as_deref().ok_or_else(|| {
            tracing::warn!("No app secret configured; cannot sign stream requests");
            CatalogError::Unauthorized
        })?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = request_signature(track_id, tier.format_id(), &timestamp, secret);
        let params = [
            ("request_ts", timestamp),
            ("request_sig", signature),
            ("track_id", track_id.to_string()),
            ("format_id", tier.format_id().to_string()),
            ("intent", "stream".to_string()),
        ];
        Ok(self.get("track/getFileUrl", &params).await?)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CatalogProvider for Client {
    async fn fetch(&self, reference: &ReleaseRef) -> Result<Release, CatalogError> {
        match reference.kind {
            ReleaseKind::Album => {
                let album: dto::Album = self
                    .get("album/get", &[("album_id", reference.id.clone())])
                    .await?;
                adapter::to_release(reference.clone(), album)
            }
            ReleaseKind::Track => {
                let track: dto::Track = self
                    .get("track/get", &[("track_id", reference.id.clone())])
                    .await?;
                adapter::track_release(reference.clone(), track)
            }
            kind => Err(CatalogError::Parse(format!(
                "{} is a collection, expand it first",
                kind
            ))),
        }
    }

    async fn expand(&self, reference: &ReleaseRef) -> Result<Collection, CatalogError> {
        let (name, entries) = match reference.kind {
            ReleaseKind::Album | ReleaseKind::Track => {
                return Ok(Collection {
                    name: None,
                    entries: vec![crate::catalog::CollectionEntry::bare(reference.clone())],
                });
            }
            ReleaseKind::Artist => {
                let (name, albums) = self
                    .get_all("artist/get", "artist_id", &reference.id, "albums", |a: dto::Artist| {
                        (a.name, a.albums)
                    })
                    .await?;
                (name, albums.iter().map(adapter::album_entry).collect::<Vec<_>>())
            }
            ReleaseKind::Label => {
                let (name, albums) = self
                    .get_all("label/get", "label_id", &reference.id, "albums", |l: dto::Label| {
                        (l.name, l.albums)
                    })
                    .await?;
                (name, albums.iter().map(adapter::album_entry).collect::<Vec<_>>())
            }
            ReleaseKind::Playlist => {
                let (name, tracks) = self
                    .get_all(
                        "playlist/get",
                        "playlist_id",
                        &reference.id,
                        "tracks",
                        |p: dto::Playlist| (p.name, p.tracks),
                    )
                    .await?;
                (name, tracks.iter().map(adapter::track_entry).collect::<Vec<_>>())
            }
        };

        tracing::info!("{} '{}': {} entries", reference.kind, name, entries.len());
        Ok(Collection {
            name: Some(name),
            entries,
        })
    }
}

#[async_trait]
impl Transport for Client {
    async fn fetch_audio(
        &self,
        track: &TrackMeta,
        tier: QualityTier,
    ) -> Result<Vec<u8>, TransportError> {
        let file = self.file_url(&track.track_id, tier).await?;

        // previews and demos come back without a sampling rate
        let is_demo = file.sample.unwrap_or(false) || file.sampling_rate.is_none();
        let url = match file.url {
            Some(url) if !is_demo => url,
            _ => return Err(TransportError::NoStream(track.track_id.clone())),
        };

        if let Some(served) = file.format_id.and_then(QualityTier::from_format_id) {
            if served != tier {
                tracing::warn!(
                    track = %track.track_id,
                    "Requested {} but the stream is {}",
                    tier,
                    served
                );
            }
        }

        self.download(&url).await
    }

    async fn fetch_cover(
        &self,
        release: &Release,
        size: CoverSize,
    ) -> Result<Vec<u8>, TransportError> {
        let url = release.cover_url.as_deref().ok_or(TransportError::NoCover)?;
        self.download(&size.apply(url)).await
    }

    async fn fetch_goody(&self, goody: &Goody) -> Result<Vec<u8>, TransportError> {
        self.download(&goody.url).await
    }
}

/// Signature for `track/getFileUrl`: md5 over the method name, the sorted
/// parameters, the timestamp and the app secret.
fn request_signature(track_id: &str, format_id: u8, timestamp: &str, secret: &str) -> String {
    let payload = format!(
        "trackgetFileUrlformat_id{}intentstreamtrack_id{}{}{}",
        format_id, track_id, timestamp, secret
    );
    format!("{:x}", Md5::digest(payload.as_bytes()))
}

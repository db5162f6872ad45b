//! Thin XRPC client for the handful of Bluesky endpoints the bot calls.
//!
//! The core pipeline talks to [`PromoApi`], never to reqwest directly, so
//! tests can substitute a recording mock. Every method is one fallible
//! remote call; no retries happen at this layer.

pub mod types;

use crate::error::RemoteError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use types::{
    CreatedRecord, FeedResponse, ListResponse, PostView, ProfileView, SearchPostsResponse,
    Session, Subject,
};

/// The remote capability groups the pipeline consumes: query search,
/// paginated feed/list reads, handle resolution, profile viewer flags,
/// own-activity reads, and write actions.
#[async_trait]
pub trait PromoApi: Send + Sync {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError>;

    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPostsResponse, RemoteError>;

    async fn get_feed(
        &self,
        feed_uri: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FeedResponse, RemoteError>;

    async fn get_list(
        &self,
        list_uri: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ListResponse, RemoteError>;

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RemoteError>;

    /// The account's own recent outbound timeline, with viewer flags set.
    /// Used as the live dedup signal alongside persisted history.
    async fn own_recent_posts(&self, limit: u32) -> Result<Vec<PostView>, RemoteError>;

    async fn create_repost(
        &self,
        subject: &Subject,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError>;

    async fn create_like(
        &self,
        subject: &Subject,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError>;

    async fn create_follow(
        &self,
        subject_did: &str,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError>;

    async fn delete_record(&self, collection: &str, rkey: &str) -> Result<(), RemoteError>;
}

// ─── Reqwest implementation ─────────────────────────────────────────────────

pub struct BskyClient {
    http: Client,
    base_url: String,
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a, R: Serialize> {
    repo: &'a str,
    collection: &'a str,
    record: R,
}

#[derive(Serialize)]
struct SubjectRecord<'a> {
    #[serde(rename = "$type")]
    record_type: &'a str,
    subject: &'a Subject,
    #[serde(rename = "createdAt")]
    created_at: &'a str,
}

#[derive(Serialize)]
struct FollowRecord<'a> {
    #[serde(rename = "$type")]
    record_type: &'a str,
    subject: &'a str,
    #[serde(rename = "createdAt")]
    created_at: &'a str,
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl BskyClient {
    /// Authenticate with an app password and return a ready client.
    ///
    /// This is the one remote failure that is fatal for the whole run.
    pub async fn login(
        service: &str,
        identifier: &str,
        password: &str,
    ) -> Result<Self, RemoteError> {
        let http = build_http_client();
        let base_url = service.trim_end_matches('/').to_string();
        let url = format!("{base_url}/xrpc/com.atproto.server.createSession");

        let response = http
            .post(&url)
            .json(&serde_json::json!({
                "identifier": identifier,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| RemoteError::Auth {
                identifier: identifier.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Auth {
                identifier: identifier.to_string(),
                message: format!("status {status}: {body}"),
            });
        }

        let session: Session = response.json().await.map_err(|e| RemoteError::Auth {
            identifier: identifier.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url,
            access_jwt: session.access_jwt,
            did: session.did,
            handle: session.handle,
        })
    }

    /// DID of the authenticated account.
    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = format!("{}/xrpc/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_jwt)
            .query(params)
            .send()
            .await
            .map_err(|e| RemoteError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        Self::decode(endpoint, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let url = format!("{}/xrpc/{endpoint}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_jwt)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        Self::decode(endpoint, response).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(|e| RemoteError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn create_record<R: Serialize>(
        &self,
        collection: &str,
        record: R,
    ) -> Result<CreatedRecord, RemoteError> {
        self.post(
            "com.atproto.repo.createRecord",
            &CreateRecordRequest {
                repo: &self.did,
                collection,
                record,
            },
        )
        .await
    }
}

#[async_trait]
impl PromoApi for BskyClient {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError> {
        #[derive(serde::Deserialize)]
        struct Resolved {
            did: String,
        }
        let out: Resolved = self
            .get("com.atproto.identity.resolveHandle", &[("handle", handle)])
            .await?;
        Ok(out.did)
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<SearchPostsResponse, RemoteError> {
        let limit = limit.to_string();
        let mut params = vec![("q", query), ("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("app.bsky.feed.searchPosts", &params).await
    }

    async fn get_feed(
        &self,
        feed_uri: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<FeedResponse, RemoteError> {
        let limit = limit.to_string();
        let mut params = vec![("feed", feed_uri), ("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("app.bsky.feed.getFeed", &params).await
    }

    async fn get_list(
        &self,
        list_uri: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<ListResponse, RemoteError> {
        let limit = limit.to_string();
        let mut params = vec![("list", list_uri), ("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.get("app.bsky.graph.getList", &params).await
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RemoteError> {
        self.get("app.bsky.actor.getProfile", &[("actor", actor)])
            .await
    }

    async fn own_recent_posts(&self, limit: u32) -> Result<Vec<PostView>, RemoteError> {
        let limit = limit.to_string();
        let out: FeedResponse = self
            .get(
                "app.bsky.feed.getAuthorFeed",
                &[("actor", self.did.as_str()), ("limit", limit.as_str())],
            )
            .await?;
        Ok(out.feed.into_iter().map(|item| item.post).collect())
    }

    async fn create_repost(
        &self,
        subject: &Subject,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        self.create_record(
            "app.bsky.feed.repost",
            SubjectRecord {
                record_type: "app.bsky.feed.repost",
                subject,
                created_at,
            },
        )
        .await
    }

    async fn create_like(
        &self,
        subject: &Subject,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        self.create_record(
            "app.bsky.feed.like",
            SubjectRecord {
                record_type: "app.bsky.feed.like",
                subject,
                created_at,
            },
        )
        .await
    }

    async fn create_follow(
        &self,
        subject_did: &str,
        created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        self.create_record(
            "app.bsky.graph.follow",
            FollowRecord {
                record_type: "app.bsky.graph.follow",
                subject: subject_did,
                created_at,
            },
        )
        .await
    }

    async fn delete_record(&self, collection: &str, rkey: &str) -> Result<(), RemoteError> {
        // Response body varies by server version; only the status matters.
        let endpoint = "com.atproto.repo.deleteRecord";
        let url = format!("{}/xrpc/{endpoint}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_jwt)
            .json(&serde_json::json!({
                "repo": self.did,
                "collection": collection,
                "rkey": rkey,
            }))
            .send()
            .await
            .map_err(|e| RemoteError::Request {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

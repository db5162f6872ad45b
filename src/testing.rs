//! In-memory [`PromoApi`] double for unit and integration tests.
//!
//! Paginated reads are fed from queues of pre-built pages; write actions
//! are recorded and can be made to fail per subject. Everything is behind
//! interior mutability because the trait takes `&self`.

use crate::bsky::PromoApi;
use crate::bsky::types::{
    CreatedRecord, FeedItem, FeedResponse, ListResponse, PostRecord, PostView, ProfileView,
    ProfileViewer, SearchPostsResponse, Subject,
};
use crate::error::RemoteError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

type PageQueue<T> = Mutex<VecDeque<Result<T, RemoteError>>>;

#[derive(Default)]
pub struct MockApi {
    me: String,
    search_pages: PageQueue<SearchPostsResponse>,
    feed_pages: PageQueue<FeedResponse>,
    list_pages: PageQueue<ListResponse>,
    handles: Mutex<HashMap<String, String>>,
    profiles: Mutex<HashMap<String, ProfileView>>,
    own_posts: Mutex<Vec<PostView>>,

    fail_reposts: Mutex<HashSet<String>>,
    fail_likes: Mutex<HashSet<String>>,
    fail_follows: Mutex<HashSet<String>>,
    fail_deletes: Mutex<HashSet<String>>,

    search_limits: Mutex<Vec<u32>>,
    reposted: Mutex<Vec<Subject>>,
    liked: Mutex<Vec<Subject>>,
    followed: Mutex<Vec<String>>,
    deleted: Mutex<Vec<(String, String)>>,
    counter: Mutex<u64>,
}

impl MockApi {
    pub fn new(me: &str) -> Self {
        Self {
            me: me.to_string(),
            ..Self::default()
        }
    }

    // ── Setup ───────────────────────────────────────────────────────────

    pub fn push_search_page(&self, page: Result<SearchPostsResponse, RemoteError>) {
        self.search_pages.lock().unwrap().push_back(page);
    }

    pub fn push_feed_page(&self, page: Result<FeedResponse, RemoteError>) {
        self.feed_pages.lock().unwrap().push_back(page);
    }

    pub fn push_list_page(&self, page: Result<ListResponse, RemoteError>) {
        self.list_pages.lock().unwrap().push_back(page);
    }

    pub fn set_handle(&self, handle: &str, did: &str) {
        self.handles
            .lock()
            .unwrap()
            .insert(handle.to_string(), did.to_string());
    }

    /// Register a profile; `following` is the follow-record URI when the
    /// account already follows this actor.
    pub fn set_profile(&self, did: &str, following: Option<&str>) {
        self.profiles.lock().unwrap().insert(
            did.to_string(),
            ProfileView {
                did: did.to_string(),
                viewer: Some(ProfileViewer {
                    following: following.map(str::to_string),
                }),
            },
        );
    }

    pub fn push_own_post(&self, post: PostView) {
        self.own_posts.lock().unwrap().push(post);
    }

    pub fn fail_repost_for(&self, subject_uri: &str) {
        self.fail_reposts
            .lock()
            .unwrap()
            .insert(subject_uri.to_string());
    }

    pub fn fail_like_for(&self, subject_uri: &str) {
        self.fail_likes
            .lock()
            .unwrap()
            .insert(subject_uri.to_string());
    }

    pub fn fail_follow_for(&self, did: &str) {
        self.fail_follows.lock().unwrap().insert(did.to_string());
    }

    pub fn fail_delete_for(&self, rkey: &str) {
        self.fail_deletes.lock().unwrap().insert(rkey.to_string());
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn search_calls(&self) -> usize {
        self.search_limits.lock().unwrap().len()
    }

    pub fn last_search_limit(&self) -> Option<u32> {
        self.search_limits.lock().unwrap().last().copied()
    }

    pub fn reposted_uris(&self) -> Vec<String> {
        self.reposted
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.uri.clone())
            .collect()
    }

    pub fn liked_uris(&self) -> Vec<String> {
        self.liked
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.uri.clone())
            .collect()
    }

    pub fn followed_dids(&self) -> Vec<String> {
        self.followed.lock().unwrap().clone()
    }

    pub fn deleted_records(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    fn next_record_uri(&self, collection: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("at://{}/{collection}/rk{}", self.me, *counter)
    }

    fn fail(endpoint: &str, what: &str) -> RemoteError {
        RemoteError::Request {
            endpoint: endpoint.to_string(),
            message: format!("mock failure for {what}"),
        }
    }
}

#[async_trait]
impl PromoApi for MockApi {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError> {
        self.handles
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| Self::fail("com.atproto.identity.resolveHandle", handle))
    }

    async fn search_posts(
        &self,
        _query: &str,
        limit: u32,
        _cursor: Option<&str>,
    ) -> Result<SearchPostsResponse, RemoteError> {
        self.search_limits.lock().unwrap().push(limit);
        self.search_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SearchPostsResponse {
                    posts: vec![],
                    cursor: None,
                })
            })
    }

    async fn get_feed(
        &self,
        _feed_uri: &str,
        _limit: u32,
        _cursor: Option<&str>,
    ) -> Result<FeedResponse, RemoteError> {
        self.feed_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(FeedResponse {
                    feed: vec![],
                    cursor: None,
                })
            })
    }

    async fn get_list(
        &self,
        _list_uri: &str,
        _limit: u32,
        _cursor: Option<&str>,
    ) -> Result<ListResponse, RemoteError> {
        self.list_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ListResponse {
                    items: vec![],
                    cursor: None,
                })
            })
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RemoteError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(actor)
            .cloned()
            .unwrap_or_else(|| ProfileView {
                did: actor.to_string(),
                viewer: Some(ProfileViewer::default()),
            }))
    }

    async fn own_recent_posts(&self, _limit: u32) -> Result<Vec<PostView>, RemoteError> {
        Ok(self.own_posts.lock().unwrap().clone())
    }

    async fn create_repost(
        &self,
        subject: &Subject,
        _created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        if self.fail_reposts.lock().unwrap().contains(&subject.uri) {
            return Err(Self::fail("com.atproto.repo.createRecord", &subject.uri));
        }
        self.reposted.lock().unwrap().push(subject.clone());
        Ok(CreatedRecord {
            uri: self.next_record_uri("app.bsky.feed.repost"),
            cid: Some("bafyrepost".to_string()),
        })
    }

    async fn create_like(
        &self,
        subject: &Subject,
        _created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        if self.fail_likes.lock().unwrap().contains(&subject.uri) {
            return Err(Self::fail("com.atproto.repo.createRecord", &subject.uri));
        }
        self.liked.lock().unwrap().push(subject.clone());
        Ok(CreatedRecord {
            uri: self.next_record_uri("app.bsky.feed.like"),
            cid: Some("bafylike".to_string()),
        })
    }

    async fn create_follow(
        &self,
        subject_did: &str,
        _created_at: &str,
    ) -> Result<CreatedRecord, RemoteError> {
        if self.fail_follows.lock().unwrap().contains(subject_did) {
            return Err(Self::fail("com.atproto.repo.createRecord", subject_did));
        }
        self.followed.lock().unwrap().push(subject_did.to_string());
        Ok(CreatedRecord {
            uri: self.next_record_uri("app.bsky.graph.follow"),
            cid: Some("bafyfollow".to_string()),
        })
    }

    async fn delete_record(&self, collection: &str, rkey: &str) -> Result<(), RemoteError> {
        if self.fail_deletes.lock().unwrap().contains(rkey) {
            return Err(Self::fail("com.atproto.repo.deleteRecord", rkey));
        }
        self.deleted
            .lock()
            .unwrap()
            .push((collection.to_string(), rkey.to_string()));
        Ok(())
    }
}

// ─── Fixture builders ───────────────────────────────────────────────────────

/// Minimal valid post view: uri + cid + author + record with `createdAt`.
pub fn post_view(uri: &str, author_did: &str, created_at: Option<&str>) -> PostView {
    PostView {
        uri: Some(uri.to_string()),
        cid: Some("bafycid".to_string()),
        author: Some(crate::bsky::types::Author {
            did: author_did.to_string(),
            handle: None,
        }),
        record: Some(PostRecord {
            text: Some(String::new()),
            created_at: created_at.map(str::to_string),
            reply: None,
            embed: None,
        }),
        indexed_at: None,
        viewer: None,
    }
}

pub fn feed_page(posts: Vec<PostView>, cursor: Option<&str>) -> FeedResponse {
    FeedResponse {
        feed: posts.into_iter().map(|post| FeedItem { post }).collect(),
        cursor: cursor.map(str::to_string),
    }
}

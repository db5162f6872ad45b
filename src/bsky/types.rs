//! Serde schemas for the XRPC responses the bot consumes.
//!
//! Loosely-structured upstream records are decoded once here, at the fetch
//! boundary, into explicit optional-field structs. Anything the bot does
//! not care about is ignored; anything malformed fails decoding as a typed
//! error instead of propagating as silent absence.

use serde::{Deserialize, Serialize};

// ─── Session ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    pub did: String,
    pub handle: String,
}

// ─── Post views ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PostView {
    pub uri: Option<String>,
    pub cid: Option<String>,
    pub author: Option<Author>,
    pub record: Option<PostRecord>,
    #[serde(rename = "indexedAt")]
    pub indexed_at: Option<String>,
    pub viewer: Option<PostViewer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub did: String,
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRecord {
    pub text: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    pub reply: Option<serde_json::Value>,
    pub embed: Option<Embed>,
}

/// Viewer-relative flags on a post: set iff the authenticated account has
/// already reposted / liked it, holding the URI of that action record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostViewer {
    pub repost: Option<String>,
    pub like: Option<String>,
}

// ─── Embeds ─────────────────────────────────────────────────────────────────

/// Structured attachment descriptor on a post record.
///
/// Only the `$type` discriminant and the fields the content filter needs
/// are decoded; unknown embed types collapse into `Other` rather than
/// failing the whole post.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(rename = "app.bsky.embed.images")]
    Images { images: Vec<serde_json::Value> },

    #[serde(rename = "app.bsky.embed.video")]
    Video,

    #[serde(rename = "app.bsky.embed.external")]
    External,

    #[serde(rename = "app.bsky.embed.record")]
    Record,

    #[serde(rename = "app.bsky.embed.recordWithMedia")]
    RecordWithMedia { media: Option<Box<Embed>> },

    #[serde(other)]
    Other,
}

// ─── Paginated responses ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchPostsResponse {
    #[serde(default)]
    pub posts: Vec<PostView>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedItem {
    pub post: PostView,
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub items: Vec<ListItem>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListItem {
    pub subject: Option<ListSubject>,
}

#[derive(Debug, Deserialize)]
pub struct ListSubject {
    pub did: String,
}

// ─── Profiles ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileView {
    pub did: String,
    #[serde(default)]
    pub viewer: Option<ProfileViewer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileViewer {
    /// URI of the follow record, set iff the account already follows.
    pub following: Option<String>,
}

// ─── Write actions ──────────────────────────────────────────────────────────

/// `{uri, cid}` pair referencing a post in a repost/like record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub uri: String,
    pub cid: String,
}

/// Result of `com.atproto.repo.createRecord`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRecord {
    pub uri: String,
    pub cid: Option<String>,
}

//! Cursor-paginated retrieval from the configured sources.
//!
//! All three fetchers share the same contract: page in batches of at most
//! 100 until `max_items` is reached, the source stops returning a cursor,
//! or a batch comes back empty. The empty-batch check fires even when a
//! cursor is still present, so a source that keeps handing out cursors for
//! nothing cannot loop the bot forever. A page failure stops paging that
//! source and keeps whatever was already fetched; it never aborts the run.

use crate::bsky::PromoApi;
use crate::bsky::types::PostView;
use tracing::warn;

const PAGE_SIZE: u32 = 100;

fn page_limit(fetched: usize, max_items: u32) -> u32 {
    PAGE_SIZE.min(max_items - fetched as u32)
}

/// Page through `app.bsky.feed.searchPosts` for `query`.
pub async fn fetch_search(api: &dyn PromoApi, query: &str, max_items: u32) -> Vec<PostView> {
    let mut posts: Vec<PostView> = Vec::new();
    let mut cursor: Option<String> = None;

    while (posts.len() as u32) < max_items {
        let limit = page_limit(posts.len(), max_items);
        let page = match api.search_posts(query, limit, cursor.as_deref()).await {
            Ok(page) => page,
            Err(error) => {
                warn!(%error, query, fetched = posts.len(), "search paging stopped");
                break;
            }
        };
        if page.posts.is_empty() {
            break;
        }
        posts.extend(page.posts);
        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }

    posts.truncate(max_items as usize);
    posts
}

/// Page through `app.bsky.feed.getFeed` for a feed generator URI.
pub async fn fetch_feed(api: &dyn PromoApi, feed_uri: &str, max_items: u32) -> Vec<PostView> {
    let mut posts: Vec<PostView> = Vec::new();
    let mut cursor: Option<String> = None;

    while (posts.len() as u32) < max_items {
        let limit = page_limit(posts.len(), max_items);
        let page = match api.get_feed(feed_uri, limit, cursor.as_deref()).await {
            Ok(page) => page,
            Err(error) => {
                warn!(%error, feed_uri, fetched = posts.len(), "feed paging stopped");
                break;
            }
        };
        if page.feed.is_empty() {
            break;
        }
        posts.extend(page.feed.into_iter().map(|item| item.post));
        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }

    posts.truncate(max_items as usize);
    posts
}

/// Page through `app.bsky.graph.getList`, returning member DIDs.
pub async fn fetch_list_members(
    api: &dyn PromoApi,
    list_uri: &str,
    max_members: u32,
) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();
    let mut cursor: Option<String> = None;

    while (members.len() as u32) < max_members {
        let limit = page_limit(members.len(), max_members);
        let page = match api.get_list(list_uri, limit, cursor.as_deref()).await {
            Ok(page) => page,
            Err(error) => {
                warn!(%error, list_uri, fetched = members.len(), "list paging stopped");
                break;
            }
        };
        if page.items.is_empty() {
            break;
        }
        members.extend(
            page.items
                .into_iter()
                .filter_map(|item| item.subject.map(|s| s.did)),
        );
        cursor = page.cursor;
        if cursor.is_none() {
            break;
        }
    }

    members.truncate(max_members as usize);
    members
}

//! Candidate selection: turns raw fetched posts into a canonical,
//! time-ordered, deduplicated sequence ready for the action engine.

use crate::bsky::types::PostView;
use crate::config::{Config, ContentPolicy};
use crate::filter::{contains_tag, has_media, is_quote, is_reply};
use crate::util::{epoch, parse_datetime};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Per-run view of a post, reduced to what the action engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub uri: String,
    pub cid: String,
    pub created_at: DateTime<Utc>,
    pub author_did: String,
}

/// Authorship admission rule, resolved from the configured list links
/// before the pipeline runs. The two list modes are mutually exclusive.
#[derive(Debug, Clone)]
pub enum AuthorPolicy {
    Open,
    Allow(HashSet<String>),
    Exclude(HashSet<String>),
}

impl AuthorPolicy {
    pub fn admits(&self, did: &str) -> bool {
        match self {
            Self::Open => true,
            Self::Allow(set) => set.contains(did),
            Self::Exclude(set) => !set.contains(did),
        }
    }
}

/// Content admission rules, lifted out of [`Config`] so the builder does
/// not depend on credentials or network settings.
#[derive(Debug, Clone)]
pub struct ContentRules {
    pub policy: ContentPolicy,
    pub tag: String,
    pub allow_replies: bool,
    pub allow_quotes: bool,
}

impl ContentRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.content_policy,
            tag: config.promo_tag().to_string(),
            allow_replies: config.allow_replies,
            allow_quotes: config.allow_quotes,
        }
    }
}

/// Rejection tallies for one build, logged when debug verbosity is on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub incomplete: usize,
    pub author_rejected: usize,
    pub already_acted: usize,
    pub too_old: usize,
    pub content_rejected: usize,
    pub duplicate: usize,
    pub accepted: usize,
}

/// Sort timestamp: record `createdAt`, else source `indexedAt`, else the
/// epoch sentinel. Never "now" — an undated post must sort oldest and sort
/// identically on every run.
pub fn sort_timestamp(post: &PostView) -> DateTime<Utc> {
    post.record
        .as_ref()
        .and_then(|r| r.created_at.as_deref())
        .and_then(parse_datetime)
        .or_else(|| post.indexed_at.as_deref().and_then(parse_datetime))
        .unwrap_or_else(epoch)
}

/// Run the full selection pipeline over posts gathered from all sources,
/// in fetch order. Output is deduplicated by URI (first occurrence wins)
/// and stably sorted oldest-first, so a bounded run promotes the newest
/// accepted content to the top of the account's timeline last.
pub fn build_candidates(
    posts: &[PostView],
    author_policy: &AuthorPolicy,
    acted_uris: &HashSet<String>,
    cutoff: Option<DateTime<Utc>>,
    rules: &ContentRules,
) -> (Vec<Candidate>, BuildStats) {
    let mut stats = BuildStats::default();
    let mut seen_uris: HashSet<&str> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for post in posts {
        let (Some(uri), Some(cid), Some(author), Some(record)) = (
            post.uri.as_deref(),
            post.cid.as_deref(),
            post.author.as_ref(),
            post.record.as_ref(),
        ) else {
            stats.incomplete += 1;
            continue;
        };

        if !seen_uris.insert(uri) {
            stats.duplicate += 1;
            continue;
        }

        if !author_policy.admits(&author.did) {
            stats.author_rejected += 1;
            continue;
        }

        if acted_uris.contains(uri) {
            stats.already_acted += 1;
            continue;
        }

        let created_at = sort_timestamp(post);
        if let Some(cutoff) = cutoff
            && created_at < cutoff
        {
            stats.too_old += 1;
            continue;
        }

        if !rules.allow_replies && is_reply(record) {
            stats.content_rejected += 1;
            continue;
        }
        if !rules.allow_quotes && is_quote(record) {
            stats.content_rejected += 1;
            continue;
        }

        let text = record.text.as_deref().unwrap_or_default();
        let passes = match rules.policy {
            ContentPolicy::Tag => contains_tag(text, &rules.tag),
            ContentPolicy::Media => has_media(record),
            ContentPolicy::TagAndMedia => {
                contains_tag(text, &rules.tag) && has_media(record)
            }
        };
        if !passes {
            stats.content_rejected += 1;
            continue;
        }

        candidates.push(Candidate {
            uri: uri.to_string(),
            cid: cid.to_string(),
            created_at,
            author_did: author.did.clone(),
        });
    }

    // Stable sort: ties keep original fetch order.
    candidates.sort_by_key(|c| c.created_at);
    stats.accepted = candidates.len();

    debug!(?stats, "candidate build finished");
    (candidates, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsky::types::{Embed, PostView};
    use crate::testing::post_view;

    fn rules(policy: ContentPolicy) -> ContentRules {
        ContentRules {
            policy,
            tag: "#bskypromo".to_string(),
            allow_replies: true,
            allow_quotes: true,
        }
    }

    fn promo_post(n: usize, author: &str, created_at: &str) -> PostView {
        let mut post = post_view(
            &format!("at://{author}/app.bsky.feed.post/{n}"),
            author,
            Some(created_at),
        );
        let record = post.record.as_mut().unwrap();
        record.text = Some("promo time #bskypromo".to_string());
        record.embed = Some(Embed::Images {
            images: vec![serde_json::json!({})],
        });
        post
    }

    fn no_acted() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn output_is_sorted_oldest_first() {
        let posts = vec![
            promo_post(1, "did:plc:a", "2026-08-22T10:00:00Z"),
            promo_post(2, "did:plc:b", "2026-08-20T10:00:00Z"),
            promo_post(3, "did:plc:c", "2026-08-21T10:00:00Z"),
        ];
        let (out, _) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        let times: Vec<_> = out.iter().map(|c| c.created_at).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(out[0].uri.ends_with("/2"));
    }

    #[test]
    fn ties_keep_fetch_order() {
        let posts = vec![
            promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z"),
            promo_post(2, "did:plc:b", "2026-08-20T10:00:00Z"),
        ];
        let (out, _) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert!(out[0].uri.ends_with("/1"));
        assert!(out[1].uri.ends_with("/2"));
    }

    #[test]
    fn undated_post_sorts_oldest_via_epoch_sentinel() {
        let mut undated = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        undated.record.as_mut().unwrap().created_at = None;
        let posts = vec![promo_post(2, "did:plc:b", "2000-01-01T00:00:00Z"), undated];
        let (out, _) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert!(out[0].uri.ends_with("/1"));
        assert_eq!(out[0].created_at, epoch());
    }

    #[test]
    fn indexed_at_backfills_missing_created_at() {
        let mut post = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        post.record.as_mut().unwrap().created_at = None;
        post.indexed_at = Some("2026-08-21T09:00:00Z".to_string());
        assert_eq!(
            sort_timestamp(&post),
            parse_datetime("2026-08-21T09:00:00Z").unwrap()
        );
    }

    #[test]
    fn incomplete_posts_are_discarded() {
        let mut missing_cid = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        missing_cid.cid = None;
        let mut missing_record = promo_post(2, "did:plc:a", "2026-08-20T10:00:00Z");
        missing_record.record = None;
        let (out, stats) = build_candidates(
            &[missing_cid, missing_record],
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert!(out.is_empty());
        assert_eq!(stats.incomplete, 2);
    }

    #[test]
    fn exclude_list_rejects_listed_authors() {
        let posts = vec![
            promo_post(1, "did:plc:banned", "2026-08-20T10:00:00Z"),
            promo_post(2, "did:plc:ok", "2026-08-20T11:00:00Z"),
        ];
        let excluded: HashSet<String> = ["did:plc:banned".to_string()].into();
        let (out, stats) = build_candidates(
            &posts,
            &AuthorPolicy::Exclude(excluded),
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].author_did, "did:plc:ok");
        assert_eq!(stats.author_rejected, 1);
    }

    #[test]
    fn allow_list_rejects_everyone_else() {
        let posts = vec![
            promo_post(1, "did:plc:member", "2026-08-20T10:00:00Z"),
            promo_post(2, "did:plc:stranger", "2026-08-20T11:00:00Z"),
        ];
        let allowed: HashSet<String> = ["did:plc:member".to_string()].into();
        let (out, _) = build_candidates(
            &posts,
            &AuthorPolicy::Allow(allowed),
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].author_did, "did:plc:member");
    }

    #[test]
    fn already_acted_posts_are_excluded_even_on_reappearance() {
        // Same URI surfacing again in a later page of the same run.
        let posts = vec![
            promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z"),
            promo_post(7, "did:plc:b", "2026-08-20T11:00:00Z"),
            promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z"),
        ];
        let acted: HashSet<String> =
            ["at://did:plc:a/app.bsky.feed.post/1".to_string()].into();
        let (out, stats) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &acted,
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].uri.ends_with("/7"));
        assert_eq!(stats.already_acted, 1);
        assert_eq!(stats.duplicate, 1);
    }

    #[test]
    fn cutoff_drops_older_posts() {
        let posts = vec![
            promo_post(1, "did:plc:a", "2026-08-19T10:00:00Z"),
            promo_post(2, "did:plc:b", "2026-08-21T10:00:00Z"),
        ];
        let cutoff = parse_datetime("2026-08-20T00:00:00Z");
        let (out, stats) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &no_acted(),
            cutoff,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(stats.too_old, 1);
    }

    #[test]
    fn disabled_cutoff_admits_ancient_posts() {
        let posts = vec![promo_post(1, "did:plc:a", "1999-12-31T00:00:00Z")];
        let (out, _) = build_candidates(
            &posts,
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::TagAndMedia),
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn tag_policy_rejects_untagged_posts() {
        let mut untagged = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        untagged.record.as_mut().unwrap().text = Some("no tag here".to_string());
        let (out, stats) = build_candidates(
            &[untagged],
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::Tag),
        );
        assert!(out.is_empty());
        assert_eq!(stats.content_rejected, 1);
    }

    #[test]
    fn media_policy_ignores_text_but_requires_media() {
        let mut linkonly = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        linkonly.record.as_mut().unwrap().embed = Some(Embed::External);
        let (out, _) = build_candidates(
            &[linkonly],
            &AuthorPolicy::Open,
            &no_acted(),
            None,
            &rules(ContentPolicy::Media),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn quote_posts_rejected_when_disallowed() {
        let mut quote = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        quote.record.as_mut().unwrap().embed = Some(Embed::RecordWithMedia {
            media: Some(Box::new(Embed::Images {
                images: vec![serde_json::json!({})],
            })),
        });
        let mut rules = rules(ContentPolicy::TagAndMedia);
        rules.allow_quotes = false;
        let (out, _) =
            build_candidates(&[quote], &AuthorPolicy::Open, &no_acted(), None, &rules);
        assert!(out.is_empty());
    }

    #[test]
    fn replies_rejected_when_disallowed() {
        let mut reply = promo_post(1, "did:plc:a", "2026-08-20T10:00:00Z");
        reply.record.as_mut().unwrap().reply = Some(serde_json::json!({"parent": {}}));
        let mut rules = rules(ContentPolicy::TagAndMedia);
        rules.allow_replies = false;
        let (out, _) =
            build_candidates(&[reply], &AuthorPolicy::Open, &no_acted(), None, &rules);
        assert!(out.is_empty());
    }
}

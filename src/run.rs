//! Run orchestrator: one scheduled invocation sequencing
//! follow → cleanup → fetch → filter → act → persist.

use crate::actions::{cleanup_old_reposts, run_actions};
use crate::bsky::PromoApi;
use crate::candidates::{AuthorPolicy, ContentRules, build_candidates};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{fetch_feed, fetch_list_members, fetch_search};
use crate::follow::follow_list_members;
use crate::state::RunState;
use crate::uri::normalize_source_link;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

/// How many of the account's own recent posts to scan for live dedup.
const OWN_ACTIVITY_SCAN: u32 = 100;

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub followed: usize,
    pub cleaned: usize,
    pub candidates: usize,
    pub acted: u32,
    pub tracked: usize,
}

/// Execute one full run against an authenticated API.
///
/// In dry-run mode the fetch and filter stages run for real but nothing is
/// written — no remote actions, no state file mutation.
pub async fn execute(
    api: &dyn PromoApi,
    own_did: &str,
    config: &Config,
    dry_run: bool,
) -> Result<RunSummary> {
    let mut state = RunState::load(&config.state_file)?;
    let mut summary = RunSummary::default();

    if !dry_run {
        summary.followed = follow_list_members(api, own_did, &mut state, config).await;
        summary.cleaned =
            cleanup_old_reposts(api, own_did, &mut state, config.cleanup_days).await;
    }

    let author_policy = resolve_author_policy(api, config).await?;
    let posts = gather_posts(api, config).await?;
    refresh_seen_caches(api, &mut state, config).await;

    let acted_uris: HashSet<String> = state.tracked_uris();
    let cutoff = (config.hours_back > 0)
        .then(|| Utc::now() - ChronoDuration::hours(config.hours_back));
    let rules = ContentRules::from_config(config);

    let (candidates, stats) =
        build_candidates(&posts, &author_policy, &acted_uris, cutoff, &rules);
    summary.candidates = candidates.len();
    info!(
        fetched = posts.len(),
        accepted = stats.accepted,
        rejected = posts.len() - stats.accepted,
        "candidate set built"
    );

    if dry_run {
        let would_act = (candidates.len() as u32).min(config.max_per_run);
        info!(would_act, "dry run — no actions committed, state untouched");
        summary.tracked = state.reposts.len();
        return Ok(summary);
    }

    summary.acted = run_actions(api, own_did, &candidates, &mut state, config).await;
    summary.tracked = state.reposts.len();

    state.save(&config.state_file)?;
    info!(
        "🔥 done — reposted+liked: {}, cleaned: {}, tracked: {}",
        summary.acted, summary.cleaned, summary.tracked
    );
    Ok(summary)
}

/// Resolve the configured allow/exclude list link into an author policy.
/// Unresolvable links here are fatal: acting with the wrong authorship
/// rule is worse than not running.
async fn resolve_author_policy(api: &dyn PromoApi, config: &Config) -> Result<AuthorPolicy> {
    if let Some(link) = config.allow_list_link.as_deref() {
        let uri = normalize_source_link(api, link).await?;
        let members = fetch_list_members(api, &uri, config.list_member_limit).await;
        return Ok(AuthorPolicy::Allow(members.into_iter().collect()));
    }
    if let Some(link) = config.exclude_list_link.as_deref() {
        let uri = normalize_source_link(api, link).await?;
        let members = fetch_list_members(api, &uri, config.list_member_limit).await;
        return Ok(AuthorPolicy::Exclude(members.into_iter().collect()));
    }
    Ok(AuthorPolicy::Open)
}

/// Pull raw posts from every configured source, search first, then feed,
/// preserving fetch order for the stable sort downstream.
async fn gather_posts(
    api: &dyn PromoApi,
    config: &Config,
) -> Result<Vec<crate::bsky::types::PostView>> {
    let mut posts = Vec::new();

    if let Some(query) = config.search_query.as_deref() {
        posts.extend(fetch_search(api, query, config.search_limit).await);
    }

    if let Some(link) = config.feed_link.as_deref() {
        let feed_uri = normalize_source_link(api, link).await?;
        posts.extend(fetch_feed(api, &feed_uri, config.search_limit).await);
    }

    Ok(posts)
}

/// Live dedup: scan the account's own recent activity and fold the viewer
/// flags into the seen caches, so posts reposted or liked outside this
/// bot's state file are still skipped.
async fn refresh_seen_caches(api: &dyn PromoApi, state: &mut RunState, config: &Config) {
    let own = match api.own_recent_posts(OWN_ACTIVITY_SCAN).await {
        Ok(posts) => posts,
        Err(error) => {
            warn!(%error, "⚠️ own-activity scan failed, relying on persisted history");
            return;
        }
    };

    for post in own {
        let Some(uri) = post.uri.as_deref() else {
            continue;
        };
        if let Some(viewer) = post.viewer.as_ref() {
            if viewer.repost.is_some() {
                state.mark_seen_reposted(uri, config.seen_cache_max);
            }
            if viewer.like.is_some() {
                state.mark_seen_liked(uri, config.seen_cache_max);
            }
        }
    }
}

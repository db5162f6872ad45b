//! Action engine: commits repost+like per candidate under the per-run
//! budget and per-author cap, and reaps expired actions from history.

use crate::bsky::PromoApi;
use crate::bsky::types::Subject;
use crate::candidates::Candidate;
use crate::config::Config;
use crate::error::{PromoError, StateError};
use crate::state::{ActionRecord, RunState};
use crate::uri::AtUri;
use crate::util::{now_iso, parse_datetime};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Pause after a failed candidate before moving to the next one.
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Pause after each housekeeping write (delete, follow).
const HOUSEKEEPING_DELAY: Duration = Duration::from_millis(150);

/// Iterate candidates oldest-first and commit repost+like for each, up to
/// the per-run budget. Returns how many candidates were committed.
///
/// A successful repost is tracked in state immediately, so later
/// candidates in the same run (and a crash before final persistence) see
/// it. A repost failure skips the candidate after a backoff; a like
/// failure after a successful repost keeps the repost and moves on.
pub async fn run_actions(
    api: &dyn PromoApi,
    own_did: &str,
    candidates: &[Candidate],
    state: &mut RunState,
    config: &Config,
) -> u32 {
    let mut committed: u32 = 0;
    let mut per_author: HashMap<&str, u32> = HashMap::new();

    for candidate in candidates {
        if committed >= config.max_per_run {
            break;
        }
        if candidate.author_did == own_did {
            continue;
        }
        if config.per_author_cap > 0 {
            let count = per_author.get(candidate.author_did.as_str()).copied().unwrap_or(0);
            if count >= config.per_author_cap {
                continue;
            }
        }

        let subject = Subject {
            uri: candidate.uri.clone(),
            cid: candidate.cid.clone(),
        };
        // One logical timestamp for both records of this candidate.
        let ts = now_iso();

        let repost = match api.create_repost(&subject, &ts).await {
            Ok(created) => created,
            Err(error) => {
                warn!(%error, uri = %candidate.uri, "⚠️ repost failed");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        state.track(ActionRecord {
            post_uri: candidate.uri.clone(),
            post_cid: candidate.cid.clone(),
            repost_uri: Some(repost.uri.clone()),
            created_at: ts.clone(),
        });
        state.mark_seen_reposted(&candidate.uri, config.seen_cache_max);

        if state.already_liked(&candidate.uri) {
            info!(uri = %candidate.uri, "already liked, repost only");
        } else {
            match api.create_like(&subject, &ts).await {
                Ok(like) => {
                    state
                        .like_records
                        .insert(candidate.uri.clone(), like.uri);
                    state.mark_seen_liked(&candidate.uri, config.seen_cache_max);
                }
                Err(error) => {
                    warn!(%error, uri = %candidate.uri, "⚠️ like failed, repost kept");
                }
            }
        }

        *per_author.entry(candidate.author_did.as_str()).or_insert(0) += 1;
        committed += 1;
        info!(uri = %candidate.uri, "✅ reposted + liked");
        tokio::time::sleep(config.post_delay).await;
    }

    committed
}

/// Delete a record the account owns, parsing `at://owner/collection/rkey`.
///
/// Refuses without a network call when the owner segment is not the acting
/// account; corrupted state must never turn into deletes against someone
/// else's repo.
pub async fn delete_owned_record(
    api: &dyn PromoApi,
    own_did: &str,
    uri: &str,
) -> Result<(), PromoError> {
    let parsed = AtUri::parse(uri).map_err(PromoError::State)?;
    if parsed.did != own_did {
        return Err(PromoError::State(StateError::ForeignRecord {
            uri: uri.to_string(),
            owner: parsed.did,
            me: own_did.to_string(),
        }));
    }
    api.delete_record(&parsed.collection, &parsed.rkey)
        .await
        .map_err(PromoError::Remote)
}

/// Partition history into recent-enough and expired; retract the repost
/// for each expired entry. An entry whose retraction fails (or that has no
/// repost URI to retract) is kept so a future run retries — history is
/// never silently dropped before it is reconciled remotely.
///
/// Returns how many entries were retracted and removed.
pub async fn cleanup_old_reposts(
    api: &dyn PromoApi,
    own_did: &str,
    state: &mut RunState,
    retention_days: i64,
) -> usize {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    let mut keep = Vec::with_capacity(state.reposts.len());
    let mut removed = 0;

    for record in std::mem::take(&mut state.reposts) {
        // Unparseable timestamps count as recent: never reap on bad data.
        let created = parse_datetime(&record.created_at).unwrap_or_else(Utc::now);
        if created >= cutoff {
            keep.push(record);
            continue;
        }

        let Some(repost_uri) = record.repost_uri.as_deref() else {
            keep.push(record);
            continue;
        };

        match delete_owned_record(api, own_did, repost_uri).await {
            Ok(()) => {
                removed += 1;
                state.repost_records.remove(&record.post_uri);
                info!(uri = %repost_uri, "🧹 deleted old repost");
            }
            Err(error) => {
                warn!(%error, uri = %repost_uri, "⚠️ delete failed, keeping for retry");
                keep.push(record);
            }
        }
        tokio::time::sleep(HOUSEKEEPING_DELAY).await;
    }

    state.reposts = keep;
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockApi;
    use chrono::SecondsFormat;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(|key| match key {
            "SKYPROMO_IDENTIFIER" => Some("bot.test".to_string()),
            "SKYPROMO_PASSWORD" => Some("pw".to_string()),
            _ => None,
        })
        .unwrap();
        config.post_delay = Duration::ZERO;
        config
    }

    fn candidate(n: usize, author: &str, created_at: &str) -> Candidate {
        Candidate {
            uri: format!("at://{author}/app.bsky.feed.post/{n}"),
            cid: "bafycid".to_string(),
            created_at: parse_datetime(created_at).unwrap(),
            author_did: author.to_string(),
        }
    }

    fn iso_days_ago(days: i64) -> String {
        (Utc::now() - ChronoDuration::days(days)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[tokio::test(start_paused = true)]
    async fn budget_commits_exactly_the_oldest_two() {
        let api = MockApi::new("did:plc:me");
        let candidates: Vec<Candidate> = (1..=5)
            .map(|n| {
                candidate(
                    n,
                    &format!("did:plc:a{n}"),
                    &format!("2026-08-2{n}T10:00:00Z"),
                )
            })
            .collect();
        let mut state = RunState::default();
        let mut config = test_config();
        config.max_per_run = 2;

        let made = run_actions(&api, "did:plc:me", &candidates, &mut state, &config).await;

        assert_eq!(made, 2);
        let reposted = api.reposted_uris();
        assert_eq!(reposted.len(), 2);
        assert!(reposted[0].ends_with("/1"));
        assert!(reposted[1].ends_with("/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn per_author_cap_limits_same_author() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![
            candidate(1, "did:plc:spammer", "2026-08-20T10:00:00Z"),
            candidate(2, "did:plc:spammer", "2026-08-20T11:00:00Z"),
            candidate(3, "did:plc:spammer", "2026-08-20T12:00:00Z"),
        ];
        let mut state = RunState::default();
        let mut config = test_config();
        config.per_author_cap = 1;

        let made = run_actions(&api, "did:plc:me", &candidates, &mut state, &config).await;

        assert_eq!(made, 1);
        assert_eq!(api.reposted_uris().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn own_posts_are_never_actioned() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![candidate(1, "did:plc:me", "2026-08-20T10:00:00Z")];
        let mut state = RunState::default();

        let made =
            run_actions(&api, "did:plc:me", &candidates, &mut state, &test_config()).await;

        assert_eq!(made, 0);
        assert!(api.reposted_uris().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repost_failure_skips_candidate_and_continues() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![
            candidate(1, "did:plc:a", "2026-08-20T10:00:00Z"),
            candidate(2, "did:plc:b", "2026-08-20T11:00:00Z"),
        ];
        api.fail_repost_for(&candidates[0].uri);
        let mut state = RunState::default();

        let made =
            run_actions(&api, "did:plc:me", &candidates, &mut state, &test_config()).await;

        assert_eq!(made, 1);
        assert_eq!(state.reposts.len(), 1);
        assert_eq!(state.reposts[0].post_uri, candidates[1].uri);
    }

    #[tokio::test(start_paused = true)]
    async fn like_failure_keeps_the_repost() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![candidate(1, "did:plc:a", "2026-08-20T10:00:00Z")];
        api.fail_like_for(&candidates[0].uri);
        let mut state = RunState::default();

        let made =
            run_actions(&api, "did:plc:me", &candidates, &mut state, &test_config()).await;

        assert_eq!(made, 1);
        assert_eq!(state.reposts.len(), 1);
        assert!(state.like_records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn already_liked_candidate_skips_the_like_call() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![candidate(1, "did:plc:a", "2026-08-20T10:00:00Z")];
        let mut state = RunState::default();
        state.mark_seen_liked(&candidates[0].uri, 100);

        run_actions(&api, "did:plc:me", &candidates, &mut state, &test_config()).await;

        assert_eq!(api.reposted_uris().len(), 1);
        assert!(api.liked_uris().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_action_is_visible_to_later_dedup() {
        let api = MockApi::new("did:plc:me");
        let candidates = vec![candidate(1, "did:plc:a", "2026-08-20T10:00:00Z")];
        let mut state = RunState::default();

        run_actions(&api, "did:plc:me", &candidates, &mut state, &test_config()).await;

        assert!(state.tracked_uris().contains(&candidates[0].uri));
        assert!(state.already_liked(&candidates[0].uri));
    }

    #[tokio::test]
    async fn delete_refuses_foreign_owner() {
        let api = MockApi::new("did:plc:me");
        let err = delete_owned_record(
            &api,
            "did:plc:me",
            "at://did:plc:other/app.bsky.feed.repost/rk1",
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            PromoError::State(StateError::ForeignRecord { .. })
        ));
        assert!(api.deleted_records().is_empty());
    }

    #[tokio::test]
    async fn delete_parses_collection_and_rkey() {
        let api = MockApi::new("did:plc:me");
        delete_owned_record(&api, "did:plc:me", "at://did:plc:me/app.bsky.feed.repost/rk9")
            .await
            .unwrap();
        assert_eq!(
            api.deleted_records(),
            vec![("app.bsky.feed.repost".to_string(), "rk9".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_removes_expired_and_keeps_recent() {
        let api = MockApi::new("did:plc:me");
        let mut state = RunState::default();
        state.track(ActionRecord {
            post_uri: "at://did:plc:a/app.bsky.feed.post/old".into(),
            post_cid: "bafy".into(),
            repost_uri: Some("at://did:plc:me/app.bsky.feed.repost/old".into()),
            created_at: iso_days_ago(20),
        });
        state.track(ActionRecord {
            post_uri: "at://did:plc:a/app.bsky.feed.post/new".into(),
            post_cid: "bafy".into(),
            repost_uri: Some("at://did:plc:me/app.bsky.feed.repost/new".into()),
            created_at: iso_days_ago(2),
        });

        let removed = cleanup_old_reposts(&api, "did:plc:me", &mut state, 14).await;

        assert_eq!(removed, 1);
        assert_eq!(state.reposts.len(), 1);
        assert_eq!(
            state.reposts[0].post_uri,
            "at://did:plc:a/app.bsky.feed.post/new"
        );
        assert!(!state
            .repost_records
            .contains_key("at://did:plc:a/app.bsky.feed.post/old"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_retraction_keeps_the_expired_entry() {
        let api = MockApi::new("did:plc:me");
        api.fail_delete_for("old");
        let mut state = RunState::default();
        state.track(ActionRecord {
            post_uri: "at://did:plc:a/app.bsky.feed.post/old".into(),
            post_cid: "bafy".into(),
            repost_uri: Some("at://did:plc:me/app.bsky.feed.repost/old".into()),
            created_at: iso_days_ago(20),
        });

        let removed = cleanup_old_reposts(&api, "did:plc:me", &mut state, 14).await;

        assert_eq!(removed, 0);
        assert_eq!(state.reposts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_timestamp_counts_as_recent() {
        let api = MockApi::new("did:plc:me");
        let mut state = RunState::default();
        state.track(ActionRecord {
            post_uri: "at://did:plc:a/app.bsky.feed.post/odd".into(),
            post_cid: "bafy".into(),
            repost_uri: Some("at://did:plc:me/app.bsky.feed.repost/odd".into()),
            created_at: "garbage".into(),
        });

        let removed = cleanup_old_reposts(&api, "did:plc:me", &mut state, 14).await;

        assert_eq!(removed, 0);
        assert_eq!(state.reposts.len(), 1);
        assert!(api.deleted_records().is_empty());
    }
}

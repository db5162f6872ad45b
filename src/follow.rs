//! Follow pass: keep the account following every member of a curated
//! list. Runs before the repost pipeline so fresh list members' posts can
//! surface in the same run's feed source next time.

use crate::bsky::PromoApi;
use crate::config::Config;
use crate::fetch::fetch_list_members;
use crate::state::RunState;
use crate::uri::normalize_source_link;
use crate::util::now_iso;
use std::time::Duration;
use tracing::{info, warn};

const FOLLOW_DELAY: Duration = Duration::from_millis(150);

/// Follow every list member not yet recorded in `state.followed`, skipping
/// the account itself. The profile's viewer flags decide whether a follow
/// record actually needs creating; either way the DID is recorded so the
/// next run skips the profile lookup. Returns how many follows were created.
///
/// An unresolvable list link logs and skips the whole pass — per-member
/// failures log and continue.
pub async fn follow_list_members(
    api: &dyn PromoApi,
    own_did: &str,
    state: &mut RunState,
    config: &Config,
) -> usize {
    let Some(link) = config.follow_list_link.as_deref() else {
        return 0;
    };

    let list_uri = match normalize_source_link(api, link).await {
        Ok(uri) => uri,
        Err(error) => {
            warn!(%error, link, "⚠️ follow list link could not be normalized");
            return 0;
        }
    };

    let members = fetch_list_members(api, &list_uri, config.list_member_limit).await;
    let mut created = 0;

    for did in members {
        if did == own_did || state.followed.contains(&did) {
            continue;
        }

        let profile = match api.get_profile(&did).await {
            Ok(profile) => profile,
            Err(error) => {
                warn!(%error, did, "⚠️ profile lookup failed");
                continue;
            }
        };

        let already_following = profile
            .viewer
            .as_ref()
            .is_some_and(|v| v.following.is_some());

        if !already_following {
            match api.create_follow(&did, &now_iso()).await {
                Ok(_) => {
                    created += 1;
                    info!(did, "✅ followed (list)");
                }
                Err(error) => {
                    warn!(%error, did, "⚠️ follow failed");
                    continue;
                }
            }
        }

        state.followed.insert(did);
        tokio::time::sleep(FOLLOW_DELAY).await;
    }

    created
}

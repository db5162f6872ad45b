use crate::bsky::PromoApi;
use crate::error::{ConfigError, StateError};
use url::Url;

/// Parsed `at://did/collection/rkey` record URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub did: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse a record URI of the form `at://did/collection/rkey`.
    pub fn parse(uri: &str) -> Result<Self, StateError> {
        let rest = uri
            .strip_prefix("at://")
            .ok_or_else(|| StateError::MalformedUri(uri.to_string()))?;
        let mut parts = rest.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(did), Some(collection), Some(rkey))
                if !did.is_empty() && !collection.is_empty() && !rkey.is_empty() =>
            {
                Ok(Self {
                    did: did.to_string(),
                    collection: collection.to_string(),
                    rkey: rkey.to_string(),
                })
            }
            _ => Err(StateError::MalformedUri(uri.to_string())),
        }
    }
}

/// What kind of source a human-facing bsky.app link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    List,
    Feed,
}

impl SourceKind {
    fn collection(self) -> &'static str {
        match self {
            Self::List => "app.bsky.graph.list",
            Self::Feed => "app.bsky.feed.generator",
        }
    }
}

/// Extract `(actor, kind, rkey)` from a `https://bsky.app/profile/...` link.
///
/// Accepts `/profile/<actor>/lists/<rkey>` and `/profile/<actor>/feed/<rkey>`.
/// Anything else is `None` — callers treat that as a fatal config problem,
/// not something to retry.
fn parse_profile_link(link: &str) -> Option<(String, SourceKind, String)> {
    let url = Url::parse(link).ok()?;
    if url.host_str() != Some("bsky.app") {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.collect();
    match segments.as_slice() {
        ["profile", actor, middle, rkey] if !actor.is_empty() && !rkey.is_empty() => {
            let kind = match *middle {
                "lists" => SourceKind::List,
                "feed" => SourceKind::Feed,
                _ => return None,
            };
            Some(((*actor).to_string(), kind, (*rkey).to_string()))
        }
        _ => None,
    }
}

/// Normalize a configured source link to an `at://` URI.
///
/// `at://` URIs pass through verbatim. Web links have their actor segment
/// resolved to a DID via the API (handles only; a DID actor short-circuits
/// the lookup). An unrecognized link shape or a failed handle lookup is a
/// `ConfigError::UnresolvableLink`.
pub async fn normalize_source_link(
    api: &dyn PromoApi,
    link: &str,
) -> Result<String, ConfigError> {
    if link.starts_with("at://") {
        return Ok(link.to_string());
    }
    let (actor, kind, rkey) = parse_profile_link(link)
        .ok_or_else(|| ConfigError::UnresolvableLink(link.to_string()))?;

    let did = if actor.starts_with("did:") {
        actor
    } else {
        api.resolve_handle(&actor)
            .await
            .map_err(|_| ConfigError::UnresolvableLink(link.to_string()))?
    };

    Ok(format!("at://{did}/{}/{rkey}", kind.collection()))
}

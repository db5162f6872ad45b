//! Run configuration, built once at startup from environment variables and
//! passed by reference into each component. No module-level globals.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Which content test a candidate must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Post text must carry the promo tag.
    Tag,
    /// Post must embed image or video media.
    Media,
    /// Both the tag and media are required.
    TagAndMedia,
}

/// All knobs for one run. Credentials are the only required settings;
/// everything else falls back to the documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub identifier: String,
    pub password: String,
    pub service: String,

    /// Hashtag search source; `None` disables the search source.
    pub search_query: Option<String>,
    /// Curated feed source (bsky.app link or `at://` URI); optional.
    pub feed_link: Option<String>,
    /// List whose members get followed each run; optional.
    pub follow_list_link: Option<String>,
    /// Only act on authors from this list.
    pub allow_list_link: Option<String>,
    /// Never act on authors from this list.
    pub exclude_list_link: Option<String>,

    pub search_limit: u32,
    pub max_per_run: u32,
    /// 0 means unlimited.
    pub per_author_cap: u32,
    /// 0 disables the recency filter.
    pub hours_back: i64,
    pub cleanup_days: i64,
    pub post_delay: Duration,
    pub list_member_limit: u32,
    pub seen_cache_max: usize,

    pub content_policy: ContentPolicy,
    pub allow_replies: bool,
    pub allow_quotes: bool,

    pub state_file: PathBuf,
    pub debug: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value lookup. Split out from
    /// [`Config::from_env`] so tests don't have to mutate process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let identifier =
            get("SKYPROMO_IDENTIFIER").ok_or(ConfigError::MissingCredentials)?;
        let password = get("SKYPROMO_PASSWORD").ok_or(ConfigError::MissingCredentials)?;

        let allow_list_link = get("SKYPROMO_ALLOW_LIST_LINK");
        let exclude_list_link = get("SKYPROMO_EXCLUDE_LIST_LINK");
        if allow_list_link.is_some() && exclude_list_link.is_some() {
            return Err(ConfigError::ConflictingAuthorLists);
        }

        let content_policy = match get("SKYPROMO_CONTENT_POLICY").as_deref() {
            None | Some("tag+media") => ContentPolicy::TagAndMedia,
            Some("tag") => ContentPolicy::Tag,
            Some("media") => ContentPolicy::Media,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "SKYPROMO_CONTENT_POLICY".into(),
                    value: other.into(),
                });
            }
        };

        Ok(Self {
            identifier,
            password,
            service: get("SKYPROMO_SERVICE")
                .unwrap_or_else(|| "https://bsky.social".to_string()),
            search_query: match get("SKYPROMO_SEARCH_QUERY") {
                Some(q) => Some(q),
                None if lookup("SKYPROMO_SEARCH_QUERY").is_some() => None, // explicitly blanked
                None => Some("#bskypromo".to_string()),
            },
            feed_link: get("SKYPROMO_FEED_LINK"),
            follow_list_link: get("SKYPROMO_FOLLOW_LIST_LINK"),
            allow_list_link,
            exclude_list_link,
            search_limit: parse_num(&get, "SKYPROMO_SEARCH_LIMIT", 200)?,
            max_per_run: parse_num(&get, "SKYPROMO_MAX_PER_RUN", 100)?,
            per_author_cap: parse_num(&get, "SKYPROMO_PER_AUTHOR_CAP", 0)?,
            hours_back: parse_num(&get, "SKYPROMO_HOURS_BACK", 24)?,
            cleanup_days: parse_num(&get, "SKYPROMO_CLEANUP_DAYS", 14)?,
            post_delay: Duration::from_millis(parse_num(&get, "SKYPROMO_POST_DELAY_MS", 1200)?),
            list_member_limit: parse_num(&get, "SKYPROMO_LIST_MEMBER_LIMIT", 500)?,
            seen_cache_max: parse_num(&get, "SKYPROMO_SEEN_CACHE_MAX", 1000)?,
            content_policy,
            allow_replies: parse_bool(&get, "SKYPROMO_ALLOW_REPLIES", true)?,
            allow_quotes: parse_bool(&get, "SKYPROMO_ALLOW_QUOTES", true)?,
            state_file: PathBuf::from(
                get("SKYPROMO_STATE_FILE").unwrap_or_else(|| "state.json".to_string()),
            ),
            debug: parse_bool(&get, "SKYPROMO_DEBUG", false)?,
        })
    }

    /// The promo tag the content filter matches against: the search query
    /// when it looks like a hashtag, otherwise the built-in default.
    pub fn promo_tag(&self) -> &str {
        match self.search_query.as_deref() {
            Some(q) if q.starts_with('#') => q,
            _ => "#bskypromo",
        }
    }
}

fn parse_num<F, N>(get: &F, key: &str, default: N) -> Result<N, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

fn parse_bool<F>(get: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).as_deref() {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| (*v).to_string())
    }

    fn base<'a>() -> Vec<(&'a str, &'a str)> {
        vec![
            ("SKYPROMO_IDENTIFIER", "bot.bsky.social"),
            ("SKYPROMO_PASSWORD", "app-password"),
        ]
    }

    #[test]
    fn defaults_apply_with_only_credentials() {
        let cfg = Config::from_lookup(env(&base())).unwrap();
        assert_eq!(cfg.service, "https://bsky.social");
        assert_eq!(cfg.search_query.as_deref(), Some("#bskypromo"));
        assert_eq!(cfg.search_limit, 200);
        assert_eq!(cfg.max_per_run, 100);
        assert_eq!(cfg.per_author_cap, 0);
        assert_eq!(cfg.hours_back, 24);
        assert_eq!(cfg.cleanup_days, 14);
        assert_eq!(cfg.post_delay, Duration::from_millis(1200));
        assert_eq!(cfg.content_policy, ContentPolicy::TagAndMedia);
        assert!(cfg.allow_replies);
        assert!(cfg.allow_quotes);
        assert_eq!(cfg.state_file, PathBuf::from("state.json"));
        assert!(!cfg.debug);
    }

    #[test]
    fn missing_credentials_is_fatal() {
        let err = Config::from_lookup(env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn both_author_lists_rejected() {
        let mut pairs = base();
        pairs.push(("SKYPROMO_ALLOW_LIST_LINK", "at://a/app.bsky.graph.list/1"));
        pairs.push(("SKYPROMO_EXCLUDE_LIST_LINK", "at://a/app.bsky.graph.list/2"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingAuthorLists));
    }

    #[test]
    fn invalid_numeric_is_reported_with_key() {
        let mut pairs = base();
        pairs.push(("SKYPROMO_MAX_PER_RUN", "lots"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "SKYPROMO_MAX_PER_RUN");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn content_policy_variants_parse() {
        for (raw, want) in [
            ("tag", ContentPolicy::Tag),
            ("media", ContentPolicy::Media),
            ("tag+media", ContentPolicy::TagAndMedia),
        ] {
            let mut pairs = base();
            pairs.push(("SKYPROMO_CONTENT_POLICY", raw));
            let cfg = Config::from_lookup(env(&pairs)).unwrap();
            assert_eq!(cfg.content_policy, want);
        }
    }

    #[test]
    fn blank_search_query_disables_search_source() {
        let mut pairs = base();
        pairs.push(("SKYPROMO_SEARCH_QUERY", ""));
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert!(cfg.search_query.is_none());
    }

    #[test]
    fn promo_tag_follows_hashtag_query() {
        let mut pairs = base();
        pairs.push(("SKYPROMO_SEARCH_QUERY", "#indiepromo"));
        let cfg = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(cfg.promo_tag(), "#indiepromo");
    }
}

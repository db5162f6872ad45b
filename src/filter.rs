//! Content predicates: media classification, quote detection, and the
//! word-boundary hashtag match.

use crate::bsky::types::{Embed, PostRecord};
use regex::Regex;

/// True iff the record's embed carries image or video media, directly or
/// wrapped in a record-with-media. External link cards, bare quotes, and
/// absent embeds do not count.
pub fn has_media(record: &PostRecord) -> bool {
    match record.embed.as_ref() {
        Some(embed) => embed_has_media(embed),
        None => false,
    }
}

fn embed_has_media(embed: &Embed) -> bool {
    match embed {
        Embed::Images { images } => !images.is_empty(),
        Embed::Video => true,
        Embed::RecordWithMedia { media: Some(inner) } => embed_has_media(inner),
        Embed::RecordWithMedia { media: None }
        | Embed::External
        | Embed::Record
        | Embed::Other => false,
    }
}

/// True iff the post embeds another record (a quote post), with or without
/// accompanying media.
pub fn is_quote(record: &PostRecord) -> bool {
    matches!(
        record.embed.as_ref(),
        Some(Embed::Record) | Some(Embed::RecordWithMedia { .. })
    )
}

/// True iff the post has a reply parent.
pub fn is_reply(record: &PostRecord) -> bool {
    record.reply.is_some()
}

/// Case-insensitive standalone-hashtag match: the tag must be preceded by
/// start-of-text or whitespace and followed by end, whitespace, or simple
/// punctuation. A plain substring test would claim `#bskypromo2` carries
/// `#bskypromo`.
pub fn contains_tag(text: &str, tag: &str) -> bool {
    if tag.is_empty() {
        return false;
    }
    let pattern = format!(r"(?i)(^|\s){}($|\s|[!,.?:;])", regex::escape(tag));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

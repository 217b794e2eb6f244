//! Write-path rules for catalog ids, text fields, ratings and episode numbers.
//!
//! Every repository write runs its input through these checks before touching
//! the database, so a rejected input is never partially applied.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::ValidationError;
use crate::models::{NewCollectionEntry, NewWatchlistEntry};

/// Upper bound for episode numbers and episode totals.
pub const MAX_EPISODE: i64 = 10_000;
pub const MAX_ID_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_SYNOPSIS_LEN: usize = 5_000;
pub const MAX_QUERY_LEN: usize = 100;

/// Image hosts accepted for poster urls (subdomains included).
pub const APPROVED_IMAGE_HOSTS: &[&str] = &["kitsu.io", "kitsu.app", "placeholder.com"];

static RE_CATALOG_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]+$").unwrap());

static RE_SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static RE_IFRAME_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<iframe\b[^>]*>.*?</iframe\s*>").unwrap());
static RE_JS_SCHEME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)javascript:").unwrap());
static RE_INLINE_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bon\w+\s*=").unwrap());

pub fn catalog_id(id: &str) -> Result<(), ValidationError> {
    if id.len() <= MAX_ID_LEN && RE_CATALOG_ID.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::CatalogId(id.to_string()))
    }
}

pub fn title(title: &str) -> Result<(), ValidationError> {
    let len = title.trim().chars().count();
    if (1..=MAX_TITLE_LEN).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::Title)
    }
}

pub fn synopsis(synopsis: &str) -> Result<(), ValidationError> {
    if synopsis.chars().count() <= MAX_SYNOPSIS_LEN {
        Ok(())
    } else {
        Err(ValidationError::SynopsisTooLong {
            max: MAX_SYNOPSIS_LEN,
        })
    }
}

/// Poster urls must be https on an approved image host.
pub fn poster_url(raw: &str) -> Result<(), ValidationError> {
    let reject = || ValidationError::PosterUrl(raw.to_string());
    let url = Url::parse(raw).map_err(|_| reject())?;
    if url.scheme() != "https" {
        return Err(reject());
    }
    let host = url.host_str().ok_or_else(reject)?;
    let approved = APPROVED_IMAGE_HOSTS
        .iter()
        .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")));
    if approved {
        Ok(())
    } else {
        Err(reject())
    }
}

pub fn api_rating(rating: f64) -> Result<(), ValidationError> {
    if rating.is_finite() && (0.0..=100.0).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::ApiRating(rating))
    }
}

pub fn episode_count(count: i64) -> Result<(), ValidationError> {
    if (0..=MAX_EPISODE).contains(&count) {
        Ok(())
    } else {
        Err(ValidationError::EpisodeCount(count))
    }
}

/// Returns the episode number as stored.
pub fn episode_number(number: i64) -> Result<u32, ValidationError> {
    if (1..=MAX_EPISODE).contains(&number) {
        Ok(number as u32)
    } else {
        Err(ValidationError::EpisodeNumber(number))
    }
}

pub fn personal_rating(rating: i64) -> Result<u8, ValidationError> {
    if (1..=10).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(ValidationError::PersonalRating(rating))
    }
}

/// Sanitise then bound a catalog search query.
pub fn search_query(query: &str) -> Result<String, ValidationError> {
    let clean = sanitize_text(query);
    let len = clean.chars().count();
    if (1..=MAX_QUERY_LEN).contains(&len) {
        Ok(clean)
    } else {
        Err(ValidationError::SearchQuery)
    }
}

/// Strip script/iframe blocks, `javascript:` and inline event handlers, then trim.
pub fn sanitize_text(text: &str) -> String {
    let text = RE_SCRIPT_BLOCK.replace_all(text, "");
    let text = RE_IFRAME_BLOCK.replace_all(&text, "");
    let text = RE_JS_SCHEME.replace_all(&text, "");
    let text = RE_INLINE_HANDLER.replace_all(&text, "");
    text.trim().to_string()
}

/// Sanitise and cut to at most `max` characters.
pub fn sanitize_truncated(text: &str, max: usize) -> String {
    let clean = sanitize_text(text);
    match clean.char_indices().nth(max) {
        Some((cut, _)) => clean[..cut].trim_end().to_string(),
        None => clean,
    }
}

/// Validate a new collection entry and return it with sanitised text fields.
pub fn collection_entry(entry: &NewCollectionEntry) -> Result<NewCollectionEntry, ValidationError> {
    catalog_id(&entry.id)?;

    let clean_title = sanitize_text(&entry.title);
    title(&clean_title)?;

    let original_title = entry
        .original_title
        .as_deref()
        .map(sanitize_text)
        .filter(|t| !t.is_empty());

    let synopsis_text = match entry.synopsis.as_deref().map(sanitize_text) {
        Some(s) if s.is_empty() => None,
        Some(s) => {
            synopsis(&s)?;
            Some(s)
        }
        None => None,
    };

    if let Some(url) = entry.poster_url.as_deref() {
        poster_url(url)?;
    }
    if let Some(rating) = entry.api_rating {
        api_rating(rating)?;
    }
    if let Some(count) = entry.total_episode_count {
        episode_count(i64::from(count))?;
    }

    Ok(NewCollectionEntry {
        id: entry.id.clone(),
        title: clean_title,
        original_title,
        synopsis: synopsis_text,
        poster_url: entry.poster_url.clone(),
        api_rating: entry.api_rating,
        status: entry.status.as_deref().map(str::trim).map(str::to_string),
        total_episode_count: entry.total_episode_count,
    })
}

pub fn watchlist_entry(entry: &NewWatchlistEntry) -> Result<NewWatchlistEntry, ValidationError> {
    catalog_id(&entry.anime_id)?;
    let clean_title = sanitize_text(&entry.title);
    title(&clean_title)?;
    if let Some(url) = entry.poster_url.as_deref() {
        poster_url(url)?;
    }
    Ok(NewWatchlistEntry {
        anime_id: entry.anime_id.clone(),
        title: clean_title,
        poster_url: entry.poster_url.clone(),
        priority: entry.priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_id_shape() {
        assert!(catalog_id("anime-42").is_ok());
        assert!(catalog_id("12345").is_ok());
        assert!(catalog_id(&"a".repeat(100)).is_ok());

        assert!(catalog_id("").is_err());
        assert!(catalog_id(&"a".repeat(101)).is_err());
        assert!(catalog_id("anime 42").is_err());
        assert!(catalog_id("../etc").is_err());
        assert!(catalog_id("anime_42").is_err());
    }

    #[test]
    fn test_poster_url_hosts() {
        assert!(poster_url("https://media.kitsu.io/anime/poster_images/1/medium.jpg").is_ok());
        assert!(poster_url("https://kitsu.io/x.png").is_ok());
        assert!(poster_url("https://via.placeholder.com/300x400").is_ok());

        assert!(poster_url("http://media.kitsu.io/x.jpg").is_err());
        assert!(poster_url("https://evil.example.com/x.jpg").is_err());
        assert!(poster_url("https://notkitsu.io/x.jpg").is_err());
        assert!(poster_url("not a url").is_err());
    }

    #[test]
    fn test_ranges() {
        assert!(api_rating(0.0).is_ok());
        assert!(api_rating(100.0).is_ok());
        assert!(api_rating(100.01).is_err());
        assert!(api_rating(f64::NAN).is_err());

        assert_eq!(episode_number(1), Ok(1));
        assert_eq!(episode_number(10_000), Ok(10_000));
        assert_eq!(episode_number(0), Err(ValidationError::EpisodeNumber(0)));
        assert_eq!(
            episode_number(10_001),
            Err(ValidationError::EpisodeNumber(10_001))
        );
        assert!(episode_number(-3).is_err());

        assert!(episode_count(0).is_ok());
        assert!(episode_count(-1).is_err());

        assert_eq!(personal_rating(10), Ok(10));
        assert!(personal_rating(0).is_err());
        assert!(personal_rating(11).is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(
            sanitize_text("  Hello <script>alert(1)</script>world "),
            "Hello world"
        );
        assert_eq!(
            sanitize_text("<iframe src=x></iframe>Frieren"),
            "Frieren"
        );
        assert_eq!(sanitize_text("javascript:void(0)"), "void(0)");
        assert_eq!(sanitize_text("<img onerror=x>"), "<img x>");
    }

    #[test]
    fn test_sanitize_truncated_respects_char_boundaries() {
        assert_eq!(sanitize_truncated("葬送のフリーレン", 2), "葬送");
        assert_eq!(sanitize_truncated("short", 100), "short");
    }

    #[test]
    fn test_search_query() {
        assert_eq!(search_query("  frieren ").unwrap(), "frieren");
        assert!(search_query("   ").is_err());
        assert!(search_query(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_collection_entry_sanitises_and_drops_blank_fields() {
        let mut entry = NewCollectionEntry::new("anime-1", "  Frieren<script>x</script> ");
        entry.synopsis = Some("   ".into());
        entry.original_title = Some("葬送のフリーレン".into());
        let clean = collection_entry(&entry).unwrap();
        assert_eq!(clean.title, "Frieren");
        assert_eq!(clean.synopsis, None);
        assert_eq!(clean.original_title.as_deref(), Some("葬送のフリーレン"));
    }

    #[test]
    fn test_collection_entry_rejects_bad_fields() {
        let mut entry = NewCollectionEntry::new("anime-1", "Frieren");
        entry.api_rating = Some(140.0);
        assert_eq!(
            collection_entry(&entry),
            Err(ValidationError::ApiRating(140.0))
        );

        let entry = NewCollectionEntry::new("anime-1", "   ");
        assert_eq!(collection_entry(&entry), Err(ValidationError::Title));

        let entry = NewCollectionEntry::new("bad id", "Frieren");
        assert!(matches!(
            collection_entry(&entry),
            Err(ValidationError::CatalogId(_))
        ));
    }
}

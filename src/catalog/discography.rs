//! Smart discography filtering.
//!
//! An artist page lists every album the artist appears on, often several
//! times in different qualities or editions. The filter keeps one entry per
//! title, by the requested artist, in the best resolution, preferring
//! remasters and dropping extras (live, deluxe, ...).

use regex::Regex;
use std::sync::LazyLock;

use super::CollectionEntry;

static REMASTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(re)?master(ed)?").expect("remaster pattern is valid"));

static EXTRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(anniversary|deluxe|live|collector|demo|expanded)")
        .expect("extra pattern is valid")
});

/// Title up to its first `(`, lower-cased.
///
/// Square brackets are kept, so `Help! [Deluxe]` and `Help!` stay apart.
/// A title that opens with `(` is used whole.
pub fn essence(title: &str) -> String {
    let head = title.split('(').next().unwrap_or_default().trim();
    let key = if head.is_empty() { title.trim() } else { head };
    key.to_lowercase()
}

fn describes(pattern: &Regex, entry: &CollectionEntry) -> bool {
    let text = format!(
        "{} {}",
        entry.title,
        entry.version.as_deref().unwrap_or_default()
    );
    pattern.is_match(&text)
}

/// Keep the best edition of each album by `artist`.
///
/// Groups keep the order in which their first entry appears.
pub fn smart_filter(artist: &str, entries: Vec<CollectionEntry>) -> Vec<CollectionEntry> {
    let mut groups: Vec<(String, Vec<CollectionEntry>)> = Vec::new();
    for entry in entries {
        let key = essence(&entry.title);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(entry),
            None => groups.push((key, vec![entry])),
        }
    }

    let mut kept = Vec::new();
    for (key, group) in groups {
        let best_depth = group.iter().map(|e| e.bit_depth.unwrap_or(0)).max();
        let best_rate = group
            .iter()
            .filter(|e| Some(e.bit_depth.unwrap_or(0)) == best_depth)
            .map(|e| e.sampling_rate.unwrap_or(0.0))
            .fold(None, |best: Option<f64>, r| Some(best.map_or(r, |b| b.max(r))));
        let has_remaster = group.iter().any(|e| describes(&REMASTER, e));

        let choice = group.into_iter().find(|e| {
            Some(e.bit_depth.unwrap_or(0)) == best_depth
                && Some(e.sampling_rate.unwrap_or(0.0)) == best_rate
                && e.artist_name.as_deref() == Some(artist)
                && !(has_remaster && !describes(&REMASTER, e))
                && !describes(&EXTRA, e)
        });
        match choice {
            Some(entry) => kept.push(entry),
            None => tracing::debug!("Smart discography dropped every edition of '{}'", key),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseKind, ReleaseRef};

    fn entry(id: &str, title: &str, artist: &str, depth: u8, rate: f64) -> CollectionEntry {
        CollectionEntry {
            reference: ReleaseRef::new(ReleaseKind::Album, id),
            title: title.to_string(),
            version: None,
            artist_name: Some(artist.to_string()),
            bit_depth: Some(depth),
            sampling_rate: Some(rate),
        }
    }

    fn ids(entries: &[CollectionEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.reference.id.as_str()).collect()
    }

    #[test]
    fn test_essence_cuts_at_first_paren() {
        assert_eq!(essence("Abbey Road (Remastered)"), "abbey road");
        assert_eq!(essence("Help! [Deluxe]"), "help! [deluxe]");
        assert_eq!(essence("Help! [Deluxe] (Live)"), "help! [deluxe]");
        assert_eq!(essence("Plain"), "plain");
        assert_eq!(essence("(What's the Story)"), "(what's the story)");
    }

    #[test]
    fn test_keeps_best_resolution_per_title() {
        let entries = vec![
            entry("a1", "Album", "Band", 16, 44.1),
            entry("a2", "Album (2009)", "Band", 24, 96.0),
            entry("a3", "Album", "Band", 24, 192.0),
            entry("b1", "Other", "Band", 16, 44.1),
        ];
        let kept = smart_filter("Band", entries);
        assert_eq!(ids(&kept), vec!["a3", "b1"]);
    }

    #[test]
    fn test_square_brackets_form_their_own_group() {
        let entries = vec![
            entry("s", "Album", "Band", 24, 96.0),
            entry("m", "Album [Mono]", "Band", 16, 44.1),
        ];
        assert_eq!(ids(&smart_filter("Band", entries)), vec!["s", "m"]);
    }

    #[test]
    fn test_drops_other_artists() {
        let entries = vec![entry("x", "Feature", "Someone Else", 24, 96.0)];
        assert!(smart_filter("Band", entries).is_empty());
    }

    #[test]
    fn test_prefers_remaster() {
        let mut remaster = entry("r", "Album", "Band", 24, 96.0);
        remaster.version = Some("2015 Remaster".to_string());
        let entries = vec![entry("o", "Album", "Band", 24, 96.0), remaster];
        assert_eq!(ids(&smart_filter("Band", entries)), vec!["r"]);
    }

    #[test]
    fn test_drops_extras() {
        let entries = vec![
            entry("d", "Album (Deluxe Edition)", "Band", 24, 96.0),
            entry("l", "Live at Wembley", "Band", 16, 44.1),
        ];
        assert!(smart_filter("Band", entries).is_empty());
    }
}

//! Content Locator
//!
//! A party's content can reach the engine under two identities: the
//! underlying catalog item, or an indirection artifact (a `.strm` file whose
//! body is that item's path) generated so the content shows up in a
//! dedicated library. Both must resolve to the same party.

use std::collections::HashMap;

use crate::catalog::Collection;
use crate::party::Party;
use crate::sync::{ItemRef, ARTIFACT_EXTENSION};

/// What the catalog knows about one party's content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyContent {
    /// Whether the party's item still exists
    pub resolvable: bool,
    /// Path of the underlying content
    pub item_path: Option<String>,
    /// Where the party's indirection artifact lives
    pub artifact_path: Option<String>,
}

impl PartyContent {
    /// Content whose item could not be checked (catalog error); kept resolvable
    pub fn unknown() -> Self {
        Self {
            resolvable: true,
            ..Default::default()
        }
    }
}

/// Resolved content for every party, keyed by party ID
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    entries: HashMap<String, PartyContent>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, party_id: impl Into<String>, content: PartyContent) {
        self.entries.insert(party_id.into(), content);
    }

    pub fn get(&self, party_id: &str) -> Option<&PartyContent> {
        self.entries.get(party_id)
    }

    /// Whether a party's content is known to be gone
    pub fn is_unresolvable(&self, party_id: &str) -> bool {
        self.entries.get(party_id).is_some_and(|c| !c.resolvable)
    }
}

/// Find the party that owns `item`. Returns its position in `parties`.
pub fn locate(parties: &[Party], index: &ContentIndex, item: &ItemRef) -> Option<usize> {
    let candidates = || {
        parties
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.item_id.is_empty())
    };

    if item.is_artifact() {
        if let Some(path) = item.path.as_deref() {
            // The artifact is the one generated for a party
            let found = candidates().find(|(_, p)| {
                index
                    .get(&p.id)
                    .and_then(|c| c.artifact_path.as_deref())
                    .is_some_and(|artifact| paths_equal(artifact, path))
            });
            if let Some((i, p)) = found {
                tracing::debug!("Artifact {} matches party {}", path, p.id);
                return Some(i);
            }
        }

        // Some other artifact pointing at the party's content
        if let Some(target) = item.artifact_target.as_deref().map(str::trim) {
            let found = candidates().find(|(_, p)| {
                index
                    .get(&p.id)
                    .and_then(|c| c.item_path.as_deref())
                    .is_some_and(|content| paths_equal(content, target))
            });
            if let Some((i, p)) = found {
                tracing::debug!("Artifact content {} matches party {}", target, p.id);
                return Some(i);
            }
        }
    }

    candidates()
        .find(|(_, p)| ids_equal(&p.item_id, &item.item_id))
        .map(|(i, _)| i)
}

/// Compare catalog IDs, ignoring GUID formatting differences
pub fn ids_equal(a: &str, b: &str) -> bool {
    let canon = |s: &str| -> String {
        s.trim()
            .chars()
            .filter(|c| *c != '-' && *c != '{' && *c != '}')
            .flat_map(char::to_lowercase)
            .collect()
    };
    !a.trim().is_empty() && canon(a) == canon(b)
}

/// Normalize a path for comparison: unify separators, resolve `.` and `..`,
/// drop trailing separators, and fold case on Windows hosts.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    let mut normalized = segments.join("/");
    if absolute {
        normalized.insert(0, '/');
    }
    if cfg!(windows) {
        normalized = normalized.to_lowercase();
    }
    normalized
}

/// Whether two paths name the same file
pub fn paths_equal(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && normalize_path(a) == normalize_path(b)
}

/// Library folder in which a party's artifact is placed
pub fn library_path_for(party: &Party, collections: &[Collection]) -> Option<String> {
    if let Some(path) = party.target_library_path.as_deref().filter(|p| !p.is_empty()) {
        return Some(path.to_string());
    }

    let first_location = |c: &Collection| c.locations.first().cloned();

    if let Some(target_id) = party.target_library_id.as_deref().filter(|id| !id.is_empty()) {
        if let Some(path) = collections
            .iter()
            .filter(|c| ids_equal(&c.id, target_id))
            .find_map(first_location)
        {
            return Some(path);
        }
    }

    if !party.collection_name.is_empty() {
        if let Some(path) = collections
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case(&party.collection_name))
            .find_map(first_location)
        {
            return Some(path);
        }
    }

    None
}

/// Where the artifact for a party lives: `<library>/<item file stem>.strm`,
/// falling back to the sanitized item name when the item has no path.
pub fn artifact_path_for(party: &Party, item_path: Option<&str>, library: &str) -> Option<String> {
    let stem = match item_path.filter(|p| !p.is_empty()) {
        Some(path) => file_stem(path).to_string(),
        None => sanitize_file_name(&party.item_name),
    };
    if stem.is_empty() {
        return None;
    }

    let separator = if library.contains('\\') && !library.contains('/') {
        '\\'
    } else {
        '/'
    };
    let library = library.trim_end_matches(['/', '\\']);
    Some(format!("{library}{separator}{stem}.{ARTIFACT_EXTENSION}"))
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(id: &str, item_id: &str) -> Party {
        Party {
            id: id.into(),
            item_id: item_id.into(),
            ..Default::default()
        }
    }

    fn index_with(entries: &[(&str, Option<&str>, Option<&str>)]) -> ContentIndex {
        let mut index = ContentIndex::new();
        for (id, item_path, artifact_path) in entries {
            index.insert(
                *id,
                PartyContent {
                    resolvable: true,
                    item_path: item_path.map(String::from),
                    artifact_path: artifact_path.map(String::from),
                },
            );
        }
        index
    }

    #[test]
    fn test_direct_item_match() {
        let parties = vec![party("p1", "111"), party("p2", "222")];
        let index = ContentIndex::new();

        assert_eq!(locate(&parties, &index, &ItemRef::item("222")), Some(1));
        assert_eq!(locate(&parties, &index, &ItemRef::item("333")), None);
    }

    #[test]
    fn test_guid_formats_match() {
        let parties = vec![party("p1", "6F9619FF-8B86-D011-B42D-00C04FC964FF")];
        let item = ItemRef::item("6f9619ff8b86d011b42d00c04fc964ff");
        assert_eq!(locate(&parties, &ContentIndex::new(), &item), Some(0));
    }

    #[test]
    fn test_artifact_path_match() {
        let parties = vec![party("p1", "111"), party("p2", "222")];
        let index = index_with(&[
            ("p1", Some("/media/a.mkv"), Some("/lib/party/a.strm")),
            ("p2", Some("/media/b.mkv"), Some("/lib/party/b.strm")),
        ]);
        let item = ItemRef::item("999").with_path("/lib/party//b.strm");

        assert_eq!(locate(&parties, &index, &item), Some(1));
    }

    #[test]
    fn test_artifact_content_match() {
        let parties = vec![party("p1", "111")];
        let index = index_with(&[("p1", Some("/media/movies/../movies/a.mkv"), None)]);
        let item = ItemRef::item("999")
            .with_path("/elsewhere/copy.strm")
            .with_artifact_target("/media/movies/a.mkv\n");

        assert_eq!(locate(&parties, &index, &item), Some(0));
    }

    #[test]
    fn test_parties_without_item_are_skipped() {
        let parties = vec![party("p1", ""), party("p2", "")];
        assert_eq!(locate(&parties, &ContentIndex::new(), &ItemRef::item("")), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b/../c/./d/"), "/a/c/d");
        assert_eq!(normalize_path("C:\\media\\film.mkv"), normalize_path("C:/media/film.mkv"));
    }

    #[test]
    fn test_library_path_resolution_order() {
        let collections = vec![
            Collection {
                id: "lib-1".into(),
                name: "Watch Party".into(),
                locations: vec!["/srv/by-name".into()],
            },
            Collection {
                id: "lib-2".into(),
                name: "Movies".into(),
                locations: vec!["/srv/by-id".into()],
            },
        ];

        let mut p = party("p1", "1");
        assert_eq!(library_path_for(&p, &collections).as_deref(), Some("/srv/by-name"));

        p.target_library_id = Some("lib-2".into());
        assert_eq!(library_path_for(&p, &collections).as_deref(), Some("/srv/by-id"));

        p.target_library_path = Some("/srv/explicit".into());
        assert_eq!(library_path_for(&p, &collections).as_deref(), Some("/srv/explicit"));

        let orphan = Party {
            collection_name: "Nope".into(),
            ..party("p2", "2")
        };
        assert_eq!(library_path_for(&orphan, &collections), None);
    }

    #[test]
    fn test_artifact_path_naming() {
        let p = Party {
            item_name: "What: A Movie?".into(),
            ..party("p1", "1")
        };
        assert_eq!(
            artifact_path_for(&p, Some("/media/Film (2001).mkv"), "/srv/party/").as_deref(),
            Some("/srv/party/Film (2001).strm")
        );
        assert_eq!(
            artifact_path_for(&p, None, "D:\\party").as_deref(),
            Some("D:\\party\\What_ A Movie_.strm")
        );
    }
}

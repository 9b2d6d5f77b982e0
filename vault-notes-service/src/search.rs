//! Substring search over the note metadata index.

use vault_notes_types::{NoteMeta, SearchHit};

use crate::error::Result;
use crate::notes::NoteIndex;

/// Case-insensitive match of `query` against the title or the
/// space-joined tags. An empty query matches every note.
pub fn matches(meta: &NoteMeta, query: &str) -> bool {
    let query = query.to_lowercase();
    let title_hit = meta
        .title
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains(&query));
    title_hit || meta.tags.join(" ").to_lowercase().contains(&query)
}

pub async fn search(index: &dyn NoteIndex, query: &str) -> Result<Vec<SearchHit>> {
    let notes = index.all_notes().await?;
    let hits: Vec<SearchHit> = notes
        .into_iter()
        .filter(|meta| matches(meta, query))
        .map(SearchHit::from)
        .collect();
    log::debug!("[SEARCH] '{}' -> {} hit(s)", query, hits.len());
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvStore;

    fn note(slug: &str, title: Option<&str>, tags: &[&str]) -> NoteMeta {
        NoteMeta {
            key: format!("public/{}.md", slug),
            slug: slug.to_string(),
            title: title.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_matches_title_and_tags() {
        let n = note("grace", Some("Grace and Entropy"), &["Physics", "theology"]);
        assert!(matches(&n, "entropy"));
        assert!(matches(&n, "GRACE"));
        assert!(matches(&n, "physics"));
        // Tags are joined with a single space
        assert!(matches(&n, "physics theo"));
        assert!(!matches(&n, "quantum"));
        assert!(matches(&n, ""));
    }

    #[test]
    fn test_matches_without_title() {
        let n = note("bare", None, &[]);
        assert!(!matches(&n, "bare"));
        assert!(matches(&n, ""));
    }

    #[tokio::test]
    async fn test_search_index() {
        let kv = KvStore::open(":memory:").unwrap();
        kv.put_note(&note("alpha", Some("Alpha Note"), &["intro"])).unwrap();
        kv.put_note(&note("beta", Some("Beta"), &["physics"])).unwrap();

        let hits = search(&kv, "alpha").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].slug, "alpha");

        assert_eq!(search(&kv, "").await.unwrap().len(), 2);
        assert!(search(&kv, "zzz").await.unwrap().is_empty());
    }
}

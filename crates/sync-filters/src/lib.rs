//! Exclusion filters applied to entry pairs. A filter is a predicate over
//! an entry; a filter set is the disjunction of its filters. Exclusion
//! never deletes an action from the plan, it only suppresses execution.

mod error;

pub use error::{FilterError, FilterResult};

use std::sync::atomic::{AtomicUsize, Ordering};

use globset::Glob;
use sync_fs::Entry;

/// A single exclusion predicate that tracks how many times it matched.
/// `root` is the absolute path of the side the entry was listed under —
/// patterns match against the full filesystem path, not the relative key.
pub trait Filter: Send + Sync {
    fn matches(&self, entry: &Entry, root: &str) -> bool;
    fn hits(&self) -> usize;
}

/// Matches entries whose name begins with `.` or whose filesystem-reported
/// hidden attribute is set.
#[derive(Default)]
pub struct HiddenFilter {
    hits: AtomicUsize,
}

impl Filter for HiddenFilter {
    fn matches(&self, entry: &Entry, _root: &str) -> bool {
        let hit = entry.hidden || entry.name().starts_with('.');
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Joins a root and a `/`-separated relative path into an absolute path
/// string, without depending on `sync-path`.
fn absolute_path(root: &str, relative_path: &str) -> String {
    if relative_path.is_empty() || relative_path == "." {
        root.to_string()
    } else if root.ends_with('/') {
        format!("{root}{relative_path}")
    } else {
        format!("{root}/{relative_path}")
    }
}

/// Shell-glob match against an entry's absolute path.
pub struct PatternFilter {
    pattern: String,
    glob: globset::GlobMatcher,
    hits: AtomicUsize,
}

impl PatternFilter {
    pub fn new(pattern: &str) -> FilterResult<Self> {
        let glob = Glob::new(pattern)
            .map_err(|e| FilterError::InvalidPattern(pattern.to_string(), e.to_string()))?
            .compile_matcher();
        Ok(PatternFilter {
            pattern: pattern.to_string(),
            glob,
            hits: AtomicUsize::new(0),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Filter for PatternFilter {
    fn matches(&self, entry: &Entry, root: &str) -> bool {
        let hit = self
            .glob
            .is_match(absolute_path(root, &entry.relative_path));
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

/// The disjunction of a set of filters.
#[derive(Default)]
pub struct FilterSet {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// True if any filter's predicate matches an existing entry. A `None`
    /// side of a pair never contributes a match. `root` is the absolute
    /// path of the side `entry` was listed under.
    pub fn excludes(&self, entry: Option<&Entry>, root: &str) -> bool {
        match entry {
            Some(entry) => self.filters.iter().any(|f| f.matches(entry, root)),
            None => false,
        }
    }

    /// `excluded ← filter(a, a_root) ∨ filter(b, b_root)`.
    pub fn excludes_pair(
        &self,
        a: Option<&Entry>,
        a_root: &str,
        b: Option<&Entry>,
        b_root: &str,
    ) -> bool {
        self.excludes(a, a_root) || self.excludes(b, b_root)
    }

    pub fn retain<'a, I>(&self, entries: I, root: &str) -> Vec<&'a Entry>
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        entries
            .into_iter()
            .filter(|e| !self.excludes(Some(e), root))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_fs::EntryKind;

    fn entry(path: &str, hidden: bool) -> Entry {
        let mut e = Entry::new(path, EntryKind::Regular);
        e.hidden = hidden;
        e
    }

    const ROOT: &str = "/srv/data";

    #[test]
    fn hidden_filter_matches_dotfiles() {
        let f = HiddenFilter::default();
        assert!(f.matches(&entry(".env", false), ROOT));
        assert!(!f.matches(&entry("visible.txt", false), ROOT));
        assert_eq!(f.hits(), 1);
    }

    #[test]
    fn hidden_filter_honours_explicit_attribute() {
        let f = HiddenFilter::default();
        assert!(f.matches(&entry("NOTHIDDEN", true), ROOT));
    }

    #[test]
    fn pattern_filter_matches_glob() {
        let f = PatternFilter::new("*.log").unwrap();
        assert!(f.matches(&entry("build/output.log", false), ROOT));
        assert!(!f.matches(&entry("build/output.txt", false), ROOT));
    }

    #[test]
    fn pattern_filter_matches_against_absolute_path() {
        let f = PatternFilter::new("/srv/data/build/*").unwrap();
        assert!(f.matches(&entry("build/output.log", false), ROOT));
        assert!(!f.matches(&entry("build/output.log", false), "/other/root"));
    }

    #[test]
    fn filter_set_is_disjunction() {
        let mut set = FilterSet::new();
        set.push(Box::new(HiddenFilter::default()));
        set.push(Box::new(PatternFilter::new("*.tmp").unwrap()));

        assert!(set.excludes(Some(&entry(".hidden", false)), ROOT));
        assert!(set.excludes(Some(&entry("scratch.tmp", false)), ROOT));
        assert!(!set.excludes(Some(&entry("keep.txt", false)), ROOT));
    }

    #[test]
    fn excludes_pair_is_true_if_either_side_matches() {
        let mut set = FilterSet::new();
        set.push(Box::new(PatternFilter::new("*.tmp").unwrap()));

        let a = entry("a.txt", false);
        let b = entry("b.tmp", false);
        assert!(set.excludes_pair(Some(&a), ROOT, Some(&b), ROOT));
    }

    #[test]
    fn missing_side_never_triggers_a_match() {
        let mut set = FilterSet::new();
        set.push(Box::new(HiddenFilter::default()));
        assert!(!set.excludes(None, ROOT));
    }
}

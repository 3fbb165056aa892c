//! Normalised, rooted paths with POSIX and NT flavours.
//!
//! A [`SyncPath`] always carries an absolute root and an absolute current
//! path that is guaranteed to sit under that root. Relative segments are
//! resolved eagerly; a path can never be constructed or navigated outside
//! of its own root.

mod error;

pub use error::{PathError, PathResult};

const SEP: char = '/';

/// Which OS family's path conventions a [`SyncPath`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathFlavor {
    Posix,
    Nt,
}

/// An absolute path rooted at a filesystem boundary.
///
/// `root` and `path` are both normalised, `/`-separated strings. `path`
/// always starts with `root`; callers reach the relative tail through
/// [`SyncPath::relative_path`].
#[derive(Debug, Clone)]
pub struct SyncPath {
    flavor: PathFlavor,
    root: String,
    path: String,
}

impl SyncPath {
    /// Builds a path rooted at `root`, initially pointing at `root` itself.
    pub fn new(flavor: PathFlavor, root: &str) -> PathResult<Self> {
        let root = normalise(flavor, root);
        if is_relative(flavor, &root) {
            return Err(PathError::NotAbsolute(root));
        }
        Ok(SyncPath {
            flavor,
            path: root.clone(),
            root,
        })
    }

    /// Builds a path rooted at `root`, positioned at `path` (absolute or
    /// relative to `root`). Fails if the resolved path escapes the root.
    pub fn rooted(flavor: PathFlavor, root: &str, path: &str) -> PathResult<Self> {
        let root_n = normalise(flavor, root);
        if is_relative(flavor, &root_n) {
            return Err(PathError::NotAbsolute(root_n));
        }

        let path_n = normalise(flavor, path);
        let resolved = if path_n.starts_with(&root_n) {
            path_n
        } else {
            normalise(flavor, &join(flavor, &[&root_n, &path_n]))
        };

        if !is_root_of(flavor, &resolved, &root_n) {
            return Err(PathError::OutsideRoot {
                path: resolved,
                root: root_n,
            });
        }

        Ok(SyncPath {
            flavor,
            root: root_n,
            path: resolved,
        })
    }

    pub fn flavor(&self) -> PathFlavor {
        self.flavor
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn absolute_path(&self) -> &str {
        &self.path
    }

    /// The path's tail relative to its root. `.` when the path is the root.
    pub fn relative_path(&self) -> String {
        if !is_root_of(self.flavor, &self.path, &self.root) {
            return self.path.clone();
        }
        let rest = &self.path[self.root.len()..];
        if rest.is_empty() {
            ".".to_string()
        } else if rest.starts_with(SEP) {
            rest[1..].to_string()
        } else {
            rest.to_string()
        }
    }

    /// Navigates in place. Escaping the root snaps back to the root rather
    /// than erroring, matching the source tool's forgiving `cd`.
    pub fn cd(&mut self, path: &str) {
        if is_absolute(self.flavor, path) {
            let candidate = normalise(self.flavor, path);
            if is_root_of(self.flavor, &candidate, &self.root) {
                self.path = candidate;
            } else {
                self.path = self.root.clone();
            }
        } else {
            let candidate = normalise(self.flavor, &format!("{}{}{}", self.path, SEP, path));
            self.path = if is_root_of(self.flavor, &candidate, &self.root) {
                candidate
            } else {
                self.root.clone()
            };
        }
    }

    /// Returns a new path navigated to `path`, leaving `self` untouched.
    pub fn visit(&self, path: &str) -> Self {
        let mut next = self.clone();
        next.cd(path);
        next
    }

    /// Re-roots this path, preserving its relative tail.
    pub fn reroot(&self, new_root: &str) -> PathResult<Self> {
        let rel = self.relative_path();
        let new_root_n = normalise(self.flavor, new_root);
        SyncPath::rooted(self.flavor, &new_root_n, &rel)
    }

    /// True if `self` is `root` or a descendant of it.
    pub fn is_under_root(&self) -> bool {
        is_root_of(self.flavor, &self.path, &self.root)
    }

    pub fn is_root(&self) -> bool {
        self.path == self.root
    }

    /// Splits the tail into non-empty path components.
    pub fn components(&self) -> Vec<String> {
        split(self.flavor, &self.relative_path())
            .into_iter()
            .filter(|c| c != ".")
            .collect()
    }
}

impl PartialEq for SyncPath {
    /// Root comparison is case-insensitive on NT volumes; the tail is
    /// always case-sensitive.
    fn eq(&self, other: &Self) -> bool {
        if self.flavor != other.flavor {
            return false;
        }
        let roots_match = match self.flavor {
            PathFlavor::Nt => self.root.eq_ignore_ascii_case(&other.root),
            PathFlavor::Posix => self.root == other.root,
        };
        roots_match && self.relative_path() == other.relative_path()
    }
}

impl Eq for SyncPath {}

impl std::fmt::Display for SyncPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relative_path())
    }
}

fn as_posix(path: &str) -> String {
    path.replace('\\', "/")
}

fn get_volume(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if let Some(idx) = trimmed.find(':') {
        if idx > 0 {
            return Some(format!("{}:", &trimmed[..idx]));
        }
    }
    None
}

fn is_absolute(flavor: PathFlavor, path: &str) -> bool {
    let path = match flavor {
        PathFlavor::Nt => {
            let vol = get_volume(path);
            match vol {
                Some(v) => path.strip_prefix(v.as_str()).unwrap_or(path),
                None => path,
            }
        }
        PathFlavor::Posix => path,
    };
    path.starts_with(SEP)
}

fn is_relative(flavor: PathFlavor, path: &str) -> bool {
    !is_absolute(flavor, path)
}

fn split(_flavor: PathFlavor, path: &str) -> Vec<String> {
    let mut tokens: Vec<String> = path.split(SEP).map(|s| s.to_string()).collect();
    if tokens.first().map(|t| t.is_empty()).unwrap_or(false) {
        tokens[0] = SEP.to_string();
    }
    tokens.into_iter().filter(|t| !t.is_empty()).collect()
}

fn join(_flavor: PathFlavor, parts: &[&str]) -> String {
    if parts.is_empty() {
        return String::new();
    }
    let mut r = parts[0].to_string();
    for p in &parts[1..] {
        let xx = r.ends_with(SEP);
        let yy = p.starts_with(SEP);
        if xx != yy {
            r.push_str(p);
        } else if xx && yy {
            r.push_str(&p[1..]);
        } else if is_relative(PathFlavor::Posix, p) {
            r.push(SEP);
            r.push_str(p);
        } else {
            r = p.to_string();
        }
    }
    r
}

fn normalise(flavor: PathFlavor, path: &str) -> String {
    let path = as_posix(path);
    let mut tokens = split(flavor, &path);
    if tokens.is_empty() {
        return SEP.to_string();
    }

    let min_idx = match flavor {
        PathFlavor::Nt => {
            let vol = get_volume(&path);
            match vol {
                Some(v) if tokens[0].eq_ignore_ascii_case(&v) => 1,
                _ => 0,
            }
        }
        PathFlavor::Posix => 0,
    };

    let rest: Vec<String> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| *i == 0 || t.as_str() != ".")
        .map(|(_, t)| t.clone())
        .collect();
    tokens = rest;

    while let Some(idx) = tokens.iter().position(|t| t == "..") {
        let start = idx.saturating_sub(1).max(min_idx);
        tokens.drain(start..=idx);
    }

    if tokens.is_empty() {
        return SEP.to_string();
    }

    let refs: Vec<&str> = tokens.iter().map(|s| s.as_str()).collect();
    join(flavor, &refs)
}

/// True when `path` is `root` or lies strictly underneath it.
fn is_root_of(flavor: PathFlavor, path: &str, root: &str) -> bool {
    if is_relative(flavor, path) {
        return true;
    }

    let spath = split(flavor, &normalise(flavor, path));
    let sroot = split(flavor, root);

    if sroot.len() > spath.len() {
        return false;
    }

    for (i, (x, y)) in sroot.iter().zip(spath.iter()).enumerate() {
        if i == 0 {
            if x.to_lowercase() != y.to_lowercase() && y != &SEP.to_string() {
                return false;
            }
        } else if x != y {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_eliminates_dot_and_dotdot() {
        let p = SyncPath::rooted(PathFlavor::Posix, "/srv/data", "/srv/data/a/../b/./c").unwrap();
        assert_eq!(p.absolute_path(), "/srv/data/b/c");
    }

    #[test]
    fn normalise_is_idempotent() {
        let once = normalise(PathFlavor::Posix, "/a/b/../c");
        let twice = normalise(PathFlavor::Posix, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn relative_path_of_root_is_dot() {
        let p = SyncPath::new(PathFlavor::Posix, "/srv/data").unwrap();
        assert_eq!(p.relative_path(), ".");
    }

    #[test]
    fn relative_path_round_trips_through_split_join() {
        let p = SyncPath::rooted(PathFlavor::Posix, "/srv/data", "a/b/c").unwrap();
        assert_eq!(p.relative_path(), "a/b/c");
        assert_eq!(p.absolute_path(), "/srv/data/a/b/c");
    }

    #[test]
    fn cannot_construct_outside_root() {
        let err = SyncPath::rooted(PathFlavor::Posix, "/srv/data", "/etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::OutsideRoot { .. }));
    }

    #[test]
    fn cd_outside_root_snaps_back_to_root() {
        let mut p = SyncPath::new(PathFlavor::Posix, "/srv/data").unwrap();
        p.cd("/etc/passwd");
        assert_eq!(p.absolute_path(), "/srv/data");
    }

    #[test]
    fn visit_does_not_mutate_original() {
        let p = SyncPath::new(PathFlavor::Posix, "/srv/data").unwrap();
        let child = p.visit("sub");
        assert_eq!(p.relative_path(), ".");
        assert_eq!(child.relative_path(), "sub");
    }

    #[test]
    fn reroot_preserves_relative_tail() {
        let p = SyncPath::rooted(PathFlavor::Posix, "/srv/data", "a/b").unwrap();
        let rerooted = p.reroot("/mnt/backup").unwrap();
        assert_eq!(rerooted.absolute_path(), "/mnt/backup/a/b");
        assert_eq!(rerooted.relative_path(), "a/b");
    }

    #[test]
    fn nt_volume_comparison_is_case_insensitive() {
        let a = SyncPath::new(PathFlavor::Nt, "C:/Users/me").unwrap();
        let b = SyncPath::new(PathFlavor::Nt, "c:/Users/me").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tail_comparison_is_case_sensitive() {
        let a = SyncPath::rooted(PathFlavor::Posix, "/srv", "A").unwrap();
        let b = SyncPath::rooted(PathFlavor::Posix, "/srv", "a").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn nt_dotdot_never_eats_the_volume() {
        let p = SyncPath::rooted(PathFlavor::Nt, "C:/Users", "../../../").unwrap();
        assert!(p.absolute_path().to_lowercase().starts_with("c:"));
    }

    proptest::proptest! {
        #[test]
        fn normalise_always_idempotent(s in "[a-z/.]{0,40}") {
            let once = normalise(PathFlavor::Posix, &format!("/{s}"));
            let twice = normalise(PathFlavor::Posix, &once);
            proptest::prop_assert_eq!(once, twice);
        }
    }
}

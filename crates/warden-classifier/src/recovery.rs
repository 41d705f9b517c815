//! Recoverability analysis for deletion commands.
//!
//! A deletion is recoverable when everything it would remove can be
//! restored from version-control history: the working directory is inside
//! a work tree, every existing target lives inside that work tree, and
//! every existing target is tracked with no modified, untracked or ignored
//! content beneath it. Absent targets make the deletion a no-op and pass.
//!
//! Absence is decided with `symlink_metadata`, so a dangling symlink counts
//! as present (and must itself be tracked), and on a case-insensitive
//! filesystem a differently-cased name that collides with an existing file
//! counts as present too.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{ClassifierError, ClassifierResult};
use crate::shell::redirection;

/// Characters that make a target path depend on shell expansion.
const EXPANSION_CHARS: &[char] = &['$', '`', '*', '?', '[', ']', '{', '}'];

/// Short flags of `shred` that consume the next word.
const SHRED_VALUE_FLAGS: &[&str] = &["-n", "-s"];

/// Queries against a version-control work tree.
///
/// Any error is treated by the caller as "not recoverable".
pub trait VersionControl: Send + Sync {
    /// Root of the work tree containing `cwd`, or `None` outside one.
    ///
    /// The root must be canonical so it compares against canonical paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn work_tree_root(&self, cwd: &Path) -> ClassifierResult<Option<PathBuf>>;

    /// Whether any tracked file lives at or beneath `rel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn is_tracked(&self, root: &Path, rel: &Path) -> ClassifierResult<bool>;

    /// Whether `rel` and everything beneath it is unmodified, with no
    /// untracked or ignored files.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn is_pristine(&self, root: &Path, rel: &Path) -> ClassifierResult<bool>;
}

/// [`VersionControl`] backed by the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_owned(),
        }
    }
}

impl GitCli {
    /// Use a specific git executable.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> ClassifierResult<std::process::Output> {
        Command::new(&self.program)
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_OPTIONAL_LOCKS", "0")
            .output()
            .map_err(|source| ClassifierError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn run_ok(&self, dir: &Path, args: &[&str], rel: &Path) -> ClassifierResult<String> {
        let spec = pathspec(rel);
        let mut full: Vec<&str> = args.to_vec();
        full.push("--");
        full.push(&spec);
        let output = self.run(dir, &full)?;
        if !output.status.success() {
            return Err(self.git_error(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn git_error(&self, output: &std::process::Output) -> ClassifierError {
        ClassifierError::Git {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        }
    }
}

/// Pathspec for `rel`, anchored at the work tree root and taken literally.
fn pathspec(rel: &Path) -> String {
    let rel = rel.to_string_lossy();
    if rel.is_empty() {
        ":(top,literal)".to_owned()
    } else {
        format!(":(top,literal){rel}")
    }
}

impl VersionControl for GitCli {
    fn work_tree_root(&self, cwd: &Path) -> ClassifierResult<Option<PathBuf>> {
        let output = self.run(cwd, &["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Ok(None);
            }
            return Err(self.git_error(&output));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if root.is_empty() {
            return Ok(None);
        }
        let root = PathBuf::from(root);
        let canonical = root
            .canonicalize()
            .map_err(|source| ClassifierError::Inspect {
                path: root.display().to_string(),
                source,
            })?;
        Ok(Some(canonical))
    }

    fn is_tracked(&self, root: &Path, rel: &Path) -> ClassifierResult<bool> {
        let listed = self.run_ok(root, &["ls-files", "-z"], rel)?;
        Ok(!listed.is_empty())
    }

    fn is_pristine(&self, root: &Path, rel: &Path) -> ClassifierResult<bool> {
        let status = self.run_ok(
            root,
            &[
                "status",
                "--porcelain=v1",
                "-z",
                "--untracked-files=all",
                "--ignored=matching",
            ],
            rel,
        )?;
        Ok(status.is_empty())
    }
}

/// Why a deletion could not be shown to be recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unrecoverable {
    /// Shell quoting could not be parsed.
    Unparsable,
    /// Targets arrive on stdin (`xargs`).
    StdinTargets,
    /// No explicit targets were given.
    NoTargets,
    /// A target depends on shell expansion.
    Expansion(String),
    /// The working directory is not inside a work tree.
    NotInRepository,
    /// An existing target lies outside the work tree.
    OutsideRepository(String),
    /// A target climbs out of a symlink with `..`, so its lexical and
    /// physical parents differ.
    SymlinkParent(String),
    /// A target is the work tree itself, contains it, or is inside `.git`.
    RepositoryMetadata(String),
    /// A target is not tracked.
    Untracked(String),
    /// A target has modified, untracked or ignored content.
    Dirty(String),
    /// The repository or filesystem could not be queried.
    GitFailed(String),
}

impl std::fmt::Display for Unrecoverable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unparsable => f.write_str("unparsable quoting"),
            Self::StdinTargets => f.write_str("targets read from stdin"),
            Self::NoTargets => f.write_str("no explicit targets"),
            Self::Expansion(t) => write!(f, "shell expansion in '{t}'"),
            Self::NotInRepository => f.write_str("not inside a repository"),
            Self::OutsideRepository(t) => write!(f, "'{t}' is outside the repository"),
            Self::SymlinkParent(t) => write!(f, "'{t}' leaves a symlink through '..'"),
            Self::RepositoryMetadata(t) => write!(f, "'{t}' covers repository metadata"),
            Self::Untracked(t) => write!(f, "'{t}' is not tracked"),
            Self::Dirty(t) => write!(f, "'{t}' has uncommitted content"),
            Self::GitFailed(e) => write!(f, "git query failed: {e}"),
        }
    }
}

/// Extract deletion targets from the arguments of `program`.
///
/// Flags are skipped until `--`; everything after `--` is a target even if
/// it starts with `-`. Redirections and their files are not targets.
#[must_use]
pub fn deletion_targets(program: &str, args: &[String]) -> Vec<String> {
    let mut targets = Vec::new();
    let mut options_done = false;
    let mut skip_next = false;

    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if let Some(consumes_next) = redirection(arg) {
            skip_next = consumes_next;
            continue;
        }
        if !options_done {
            if arg == "--" {
                options_done = true;
                continue;
            }
            if arg.starts_with('-') && arg.len() > 1 {
                if program == "shred" && SHRED_VALUE_FLAGS.contains(&arg.as_str()) {
                    skip_next = true;
                }
                continue;
            }
        }
        targets.push(arg.clone());
    }
    targets
}

/// Check that deleting `targets` from `cwd` is recoverable.
///
/// # Errors
///
/// Returns the first reason the deletion is not recoverable.
pub fn check_targets<V: VersionControl + ?Sized>(
    vcs: &V,
    cwd: &Path,
    targets: &[String],
) -> Result<(), Unrecoverable> {
    if targets.is_empty() {
        return Err(Unrecoverable::NoTargets);
    }
    if let Some(t) = targets.iter().find(|t| has_expansion(t)) {
        return Err(Unrecoverable::Expansion(t.clone()));
    }

    let root = match vcs.work_tree_root(cwd) {
        Ok(Some(root)) => root,
        Ok(None) => return Err(Unrecoverable::NotInRepository),
        Err(e) => return Err(Unrecoverable::GitFailed(e.to_string())),
    };

    for target in targets {
        check_target(vcs, cwd, &root, target)?;
    }
    Ok(())
}

fn check_target<V: VersionControl + ?Sized>(
    vcs: &V,
    cwd: &Path,
    root: &Path,
    target: &str,
) -> Result<(), Unrecoverable> {
    let joined = cwd.join(target);

    match std::fs::symlink_metadata(&joined) {
        Ok(_) => {},
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(target, "deletion target absent");
            return Ok(());
        },
        Err(e) => {
            return Err(Unrecoverable::GitFailed(
                ClassifierError::Inspect {
                    path: joined.display().to_string(),
                    source: e,
                }
                .to_string(),
            ));
        },
    }

    let Some(normalized) = normalize(&joined) else {
        return Err(Unrecoverable::SymlinkParent(target.to_owned()));
    };
    let resolved = resolve_without_final_link(&normalized)
        .map_err(|e| Unrecoverable::GitFailed(e.to_string()))?;

    if resolved == root || root.starts_with(&resolved) {
        return Err(Unrecoverable::RepositoryMetadata(target.to_owned()));
    }
    let Ok(rel) = resolved.strip_prefix(root) else {
        return Err(Unrecoverable::OutsideRepository(target.to_owned()));
    };
    if rel.components().any(|c| c.as_os_str() == ".git") {
        return Err(Unrecoverable::RepositoryMetadata(target.to_owned()));
    }

    match vcs.is_tracked(root, rel) {
        Ok(true) => {},
        Ok(false) => return Err(Unrecoverable::Untracked(target.to_owned())),
        Err(e) => return Err(Unrecoverable::GitFailed(e.to_string())),
    }
    match vcs.is_pristine(root, rel) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Unrecoverable::Dirty(target.to_owned())),
        Err(e) => Err(Unrecoverable::GitFailed(e.to_string())),
    }
}

fn has_expansion(target: &str) -> bool {
    target.starts_with('~') || target.contains(EXPANSION_CHARS)
}

/// Canonicalize the parent of `path` and re-attach the final component,
/// so a symlink target resolves to the link itself rather than what it
/// points at.
fn resolve_without_final_link(normalized: &Path) -> ClassifierResult<PathBuf> {
    let inspect = |source| ClassifierError::Inspect {
        path: normalized.display().to_string(),
        source,
    };
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = parent.canonicalize().map_err(inspect)?;
            Ok(parent.join(name))
        },
        _ => normalized.canonicalize().map_err(inspect),
    }
}

/// Lexically remove `.` and `..` components.
///
/// `None` when a `..` follows a symlink: the kernel resolves it against the
/// link's target, not the directory holding the link.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if std::fs::symlink_metadata(&out).is_ok_and(|m| m.file_type().is_symlink()) {
                    return None;
                }
                if !out.pop() {
                    out.push(component);
                }
            },
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory repository: maps relative paths to (tracked, pristine).
    struct FakeRepo {
        root: Option<PathBuf>,
        entries: HashMap<PathBuf, (bool, bool)>,
        fail: bool,
    }

    impl VersionControl for FakeRepo {
        fn work_tree_root(&self, _cwd: &Path) -> ClassifierResult<Option<PathBuf>> {
            if self.fail {
                return Err(ClassifierError::Git {
                    program: "git".into(),
                    status: "exit status: 128".into(),
                    stderr: "boom".into(),
                });
            }
            Ok(self.root.clone())
        }

        fn is_tracked(&self, _root: &Path, rel: &Path) -> ClassifierResult<bool> {
            Ok(self.entries.get(rel).is_some_and(|e| e.0))
        }

        fn is_pristine(&self, _root: &Path, rel: &Path) -> ClassifierResult<bool> {
            Ok(self.entries.get(rel).is_none_or(|e| e.1))
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    fn fixture(entries: &[(&str, bool, bool)]) -> (tempfile::TempDir, FakeRepo) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut map = HashMap::new();
        for (name, tracked, pristine) in entries {
            std::fs::write(root.join(name), "x").unwrap();
            map.insert(PathBuf::from(name), (*tracked, *pristine));
        }
        let repo = FakeRepo {
            root: Some(root),
            entries: map,
            fail: false,
        };
        (dir, repo)
    }

    #[test]
    fn targets_skip_flags_until_separator() {
        assert_eq!(
            deletion_targets("rm", &args(&["-rf", "a", "--", "-weird", "--"])),
            vec!["a", "-weird", "--"]
        );
    }

    #[test]
    fn targets_skip_redirections() {
        assert_eq!(
            deletion_targets("rm", &args(&["a", "2>/dev/null", ">", "log", "b"])),
            vec!["a", "b"]
        );
    }

    #[test]
    fn shred_value_flags_consume_next() {
        assert_eq!(
            deletion_targets("shred", &args(&["-n", "3", "-u", "secret"])),
            vec!["secret"]
        );
    }

    #[test]
    fn tracked_pristine_target_is_recoverable() {
        let (dir, repo) = fixture(&[("tracked.txt", true, true)]);
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(check_targets(&repo, &cwd, &args(&["tracked.txt"])), Ok(()));
    }

    #[test]
    fn untracked_target_is_not_recoverable() {
        let (dir, repo) = fixture(&[("new.txt", false, false)]);
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(
            check_targets(&repo, &cwd, &args(&["new.txt"])),
            Err(Unrecoverable::Untracked("new.txt".into()))
        );
    }

    #[test]
    fn modified_target_is_not_recoverable() {
        let (dir, repo) = fixture(&[("edited.txt", true, false)]);
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(
            check_targets(&repo, &cwd, &args(&["edited.txt"])),
            Err(Unrecoverable::Dirty("edited.txt".into()))
        );
    }

    #[test]
    fn absent_target_is_a_no_op() {
        let (dir, repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(check_targets(&repo, &cwd, &args(&["ghost.txt"])), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_present() {
        let (dir, repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(cwd.join("missing"), cwd.join("link")).unwrap();
        assert_eq!(
            check_targets(&repo, &cwd, &args(&["link"])),
            Err(Unrecoverable::Untracked("link".into()))
        );
    }

    #[test]
    fn expansion_is_ambiguous() {
        let (dir, repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        for t in ["*.txt", "$HOME/x", "~/x", "a{b,c}", "`pwd`"] {
            assert!(
                matches!(
                    check_targets(&repo, &cwd, &args(&[t])),
                    Err(Unrecoverable::Expansion(_))
                ),
                "{t}"
            );
        }
    }

    #[test]
    fn no_targets_is_ambiguous() {
        let (dir, repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(
            check_targets(&repo, &cwd, &[]),
            Err(Unrecoverable::NoTargets)
        );
    }

    #[test]
    fn outside_repository_is_rejected() {
        let (dir, mut repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let outside_file = outside.path().canonicalize().unwrap().join("f.txt");
        std::fs::write(&outside_file, "x").unwrap();
        repo.entries.insert(PathBuf::from("f.txt"), (true, true));
        let target = outside_file.display().to_string();
        assert_eq!(
            check_targets(&repo, &cwd, &args(&[&target])),
            Err(Unrecoverable::OutsideRepository(target.clone()))
        );
    }

    #[test]
    fn repository_root_and_metadata_are_rejected() {
        let (dir, repo) = fixture(&[]);
        let cwd = dir.path().canonicalize().unwrap();
        std::fs::create_dir(cwd.join(".git")).unwrap();
        assert!(matches!(
            check_targets(&repo, &cwd, &args(&["."])),
            Err(Unrecoverable::RepositoryMetadata(_))
        ));
        assert!(matches!(
            check_targets(&repo, &cwd, &args(&[".git"])),
            Err(Unrecoverable::RepositoryMetadata(_))
        ));
    }

    #[test]
    fn not_in_repository() {
        let (dir, mut repo) = fixture(&[("a.txt", true, true)]);
        repo.root = None;
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(
            check_targets(&repo, &cwd, &args(&["a.txt"])),
            Err(Unrecoverable::NotInRepository)
        );
    }

    #[test]
    fn git_failure_is_not_recoverable() {
        let (dir, mut repo) = fixture(&[("a.txt", true, true)]);
        repo.fail = true;
        let cwd = dir.path().canonicalize().unwrap();
        assert!(matches!(
            check_targets(&repo, &cwd, &args(&["a.txt"])),
            Err(Unrecoverable::GitFailed(_))
        ));
    }

    #[test]
    fn normalize_handles_dots() {
        assert_eq!(
            normalize(Path::new("/a/./b/../c")),
            Some(PathBuf::from("/a/c"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn parent_of_a_symlink_is_ambiguous() {
        let (dir, repo) = fixture(&[("kept.txt", true, true)]);
        let cwd = dir.path().canonicalize().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        std::fs::create_dir(elsewhere.path().join("inner")).unwrap();
        std::fs::write(elsewhere.path().join("kept.txt"), "x").unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("inner"), cwd.join("link")).unwrap();

        assert_eq!(normalize(&cwd.join("link/../kept.txt")), None);
        assert_eq!(
            check_targets(&repo, &cwd, &args(&["link/../kept.txt"])),
            Err(Unrecoverable::SymlinkParent("link/../kept.txt".into()))
        );
        assert_eq!(check_targets(&repo, &cwd, &args(&["./kept.txt"])), Ok(()));
    }
}

//! Stand-in for the original's `main.c`/`tester/test.c` CLI driver (§6): no
//! standalone binary is shipped, but `run_paths` reproduces its behavior —
//! recursively discover `.c` files under each given path, sort
//! lexicographically, compile and invoke `main` for each, and report a
//! pass/fail summary — so the `tests/` integration fixtures have something
//! to call instead of reimplementing the walk themselves.
//!
//! A fixture passes exactly when compilation succeeds, `main` is found,
//! and invoking it returns `0` — the same convention `run_test` in
//! `tester/test.c` uses (`result == 0`). The six scenarios in §8 check
//! specific nonzero return values instead, which is why `tests/end_to_end.rs`
//! calls [`crate::Context`] directly rather than through this module.

use std::path::{Path, PathBuf};

use crate::context::Context;

/// One fixture's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

/// One fixture file's path (relative to the root it was discovered under)
/// and outcome.
#[derive(Debug, Clone)]
pub struct FixtureResult {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Aggregate counters mirroring `test.c`'s `total`/`ran`/`failed` trio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub ran: usize,
    pub failed: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Recursively discover and run every `.c` fixture beneath `roots`,
/// skipping any path for which `skip(path)` returns `Some(reason)`.
pub fn run_paths(roots: &[impl AsRef<Path>], skip: impl Fn(&Path) -> Option<String>) -> (Summary, Vec<FixtureResult>) {
    let mut files = Vec::new();
    for root in roots {
        let root = root.as_ref();
        if root.is_dir() {
            discover(root, &mut files);
        } else {
            files.push(root.to_path_buf());
        }
    }
    files.sort();

    let mut summary = Summary::default();
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        summary.total += 1;
        if let Some(reason) = skip(&path) {
            results.push(FixtureResult {
                path,
                outcome: Outcome::Skipped(reason),
            });
            continue;
        }
        summary.ran += 1;
        let outcome = run_one(&path);
        if matches!(outcome, Outcome::Failed(_)) {
            summary.failed += 1;
        }
        results.push(FixtureResult { path, outcome });
    }
    (summary, results)
}

fn discover(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            discover(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "c") {
            out.push(path);
        }
    }
}

fn run_one(path: &Path) -> Outcome {
    let mut ctx = Context::host();
    if let Err(err) = ctx.parse_file(path) {
        return Outcome::Failed(format!("compile error: {err}"));
    }
    let Some(addr) = ctx.get("main") else {
        return Outcome::Failed("no `main` function".to_string());
    };
    let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
    let result = main_fn();
    if result == 0 {
        Outcome::Passed
    } else {
        Outcome::Failed(format!("returned {result}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn summary_counts_distinguish_ran_from_skipped() {
        let dir = std::env::temp_dir().join(format!("jitc-test-runner-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let ok_path = dir.join("ok.c");
        let mut f = std::fs::File::create(&ok_path).unwrap();
        writeln!(f, "int main(){{return 0;}}").unwrap();
        let fail_path = dir.join("fail.c");
        let mut f = std::fs::File::create(&fail_path).unwrap();
        writeln!(f, "int main(){{return 1;}}").unwrap();

        let (summary, results) = run_paths(&[&dir], |_| None);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.ran, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_passed());
        assert!(results.iter().any(|r| r.path == ok_path && r.outcome == Outcome::Passed));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn skip_predicate_excludes_from_ran_and_failed() {
        let dir = std::env::temp_dir().join(format!("jitc-test-runner-skip-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("not-yet-supported.c");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "int main(){{return 1;}}").unwrap();

        let (summary, results) = run_paths(&[&dir], |_| Some("known unsupported".to_string()));
        assert_eq!(summary.total, 1);
        assert_eq!(summary.ran, 0);
        assert_eq!(summary.failed, 0);
        assert!(matches!(&results[0].outcome, Outcome::Skipped(reason) if reason == "known unsupported"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

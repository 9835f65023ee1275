use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// A bare repository plus a working clone used to push commits into it.
pub struct GitRemote {
    dir: TempDir,
}

impl GitRemote {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "--bare", "--quiet", "remote.git"]);
        git(
            &dir.path().join("remote.git"),
            &["symbolic-ref", "HEAD", "refs/heads/main"],
        );
        git(dir.path(), &["init", "--quiet", "work"]);
        git(&dir.path().join("work"), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self { dir }
    }

    pub fn url(&self) -> String {
        self.dir.path().join("remote.git").to_string_lossy().into_owned()
    }

    /// Writes `files` into the working tree, commits and pushes to `main`.
    pub fn push(&self, files: &[(&str, &str)]) {
        let work = self.work();
        for (rel, contents) in files {
            let path = work.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        git(&work, &["add", "--all"]);
        git(
            &work,
            &[
                "-c",
                "user.name=meta",
                "-c",
                "user.email=meta@example.org",
                "commit",
                "--quiet",
                "-m",
                "update",
            ],
        );
        git(&work, &["push", "--quiet", &self.url(), "HEAD:refs/heads/main"]);
    }

    fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }
}

pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

//! Remembers which article urls a source has already produced
//!
//! One plain-text file per source domain, one url per line. The file name is
//! the SHA-256 hex digest of the domain so any host maps to a safe name.

use crate::model::Article;
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct MemoStore {
    dir: PathBuf,
}

impl MemoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the memo file for `domain`
    pub fn path_for(&self, domain: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        self.dir.join(hex::encode(hasher.finalize()))
    }

    /// Loads the urls already seen for `domain`; a missing file means none
    pub fn load(&self, domain: &str) -> Result<HashSet<String>> {
        match fs::read_to_string(self.path_for(domain)) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Keeps only candidates whose url was not seen before, and records them
    ///
    /// Repeated urls inside `candidates` all survive; deduplication is left to
    /// the caller.
    pub fn filter_new(&self, domain: &str, candidates: Vec<Article>) -> Result<Vec<Article>> {
        let seen = self.load(domain)?;
        let fresh: Vec<Article> = candidates
            .into_iter()
            .filter(|article| !seen.contains(&article.url))
            .collect();

        let mut recorded = HashSet::new();
        let new_lines: Vec<&str> = fresh
            .iter()
            .map(|article| article.url.as_str())
            .filter(|url| recorded.insert(*url))
            .collect();

        if !new_lines.is_empty() {
            fs::create_dir_all(&self.dir)?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(domain))?;
            for url in &new_lines {
                writeln!(file, "{}", url)?;
            }
        }

        tracing::debug!(
            domain,
            seen = seen.len(),
            new = new_lines.len(),
            "Filtered memoized articles"
        );
        Ok(fresh)
    }

    /// Forgets every url recorded for `domain`
    pub fn clear(&self, domain: &str) -> Result<()> {
        match fs::remove_file(self.path_for(domain)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::RwLock;

/// Posting list: document id -> term frequency in that document.
pub type Postings = HashMap<String, u64>;

/// The global inverted index.
///
/// One logical writer (the merger; save/load also take the write side), many
/// concurrent readers (searches). The lock is a plain `std::sync::RwLock`
/// held only across synchronous in-memory sections — never across an
/// `.await`, and never around disk IO — so a reader always sees a complete
/// posting list for any term, never a partially merged one.
pub struct GlobalIndex {
    terms: RwLock<HashMap<String, Postings>>,
}

impl GlobalIndex {
    pub fn new() -> Self {
        Self {
            terms: RwLock::new(HashMap::new()),
        }
    }

    /// Folds one worker's partial result for `doc_id` into the index.
    ///
    /// Each entry must carry its frequency under the document's own id and
    /// the frequency must be positive; anything else is dropped with a
    /// warning so one bad term never poisons the rest of the partial.
    /// Re-merging the same partial is idempotent, and a re-index of the same
    /// document overwrites its previous per-term counts (last writer wins).
    pub fn merge_partial(&self, doc_id: &str, partial: &HashMap<String, Postings>) {
        let mut terms = self.terms.write().expect("index lock");
        for (term, doc_freqs) in partial {
            let Some(&freq) = doc_freqs.get(doc_id) else {
                tracing::warn!(
                    "Term '{}' in partial for doc {} does not mention the doc itself; skipping",
                    term,
                    doc_id
                );
                continue;
            };
            if freq == 0 {
                tracing::warn!(
                    "Term '{}' for doc {} has zero frequency; skipping",
                    term,
                    doc_id
                );
                continue;
            }
            terms
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), freq);
        }
    }

    /// Posting list for a term, sorted by frequency descending, then by
    /// document id ascending for determinism. Absent terms yield an empty
    /// list.
    pub fn postings(&self, term: &str) -> Vec<(String, u64)> {
        let terms = self.terms.read().expect("index lock");
        let mut docs: Vec<(String, u64)> = terms
            .get(term)
            .map(|postings| {
                postings
                    .iter()
                    .map(|(doc_id, &freq)| (doc_id.clone(), freq))
                    .collect()
            })
            .unwrap_or_default();
        docs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        docs
    }

    pub fn term_count(&self) -> usize {
        self.terms.read().expect("index lock").len()
    }

    /// Writes the full index as gzip-compressed JSON `{term: {doc_id: freq}}`.
    ///
    /// The snapshot is cloned out under the read lock, then compressed and
    /// written on the blocking pool — gzipping a large index would otherwise
    /// stall an async worker thread. The bytes go to a temporary file in the
    /// target directory first and are renamed into place, so a concurrent
    /// reader of `path` sees either the previous snapshot or the new one,
    /// never a partial file.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.terms.read().expect("index lock").clone();
        let term_count = snapshot.len();
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let parent = match target.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

            let mut tmp = tempfile::NamedTempFile::new_in(parent)
                .context("creating temporary snapshot file")?;
            {
                let mut encoder = GzEncoder::new(&mut tmp, Compression::default());
                serde_json::to_writer(&mut encoder, &snapshot)
                    .context("encoding index snapshot")?;
                encoder.finish().context("finishing gzip stream")?;
            }
            tmp.persist(&target)
                .with_context(|| format!("replacing snapshot at {}", target.display()))?;
            Ok(())
        })
        .await
        .context("snapshot writer task panicked")??;

        tracing::info!(
            "Saved index snapshot to {} ({} terms)",
            path.display(),
            term_count
        );
        Ok(())
    }

    /// Replaces the in-memory index with the snapshot at `path` in one step.
    /// An absent file is not an error; it yields an empty index. Returns the
    /// number of terms loaded.
    ///
    /// Reading and decompressing happen on the blocking pool; only the final
    /// swap takes the write lock.
    pub async fn load(&self, path: &Path) -> Result<usize> {
        let target = path.to_path_buf();

        let loaded: HashMap<String, Postings> =
            tokio::task::spawn_blocking(move || -> Result<HashMap<String, Postings>> {
                match std::fs::File::open(&target) {
                    Ok(file) => serde_json::from_reader(GzDecoder::new(file))
                        .with_context(|| format!("decoding snapshot at {}", target.display())),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        tracing::info!(
                            "Snapshot {} not found; starting with an empty index",
                            target.display()
                        );
                        Ok(HashMap::new())
                    }
                    Err(e) => {
                        Err(e).with_context(|| format!("opening snapshot at {}", target.display()))
                    }
                }
            })
            .await
            .context("snapshot reader task panicked")??;

        let term_count = loaded.len();
        *self.terms.write().expect("index lock") = loaded;
        tracing::info!("Index reloaded: {} terms", term_count);
        Ok(term_count)
    }
}

impl Default for GlobalIndex {
    fn default() -> Self {
        Self::new()
    }
}

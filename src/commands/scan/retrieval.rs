use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use super::CheckpointStore;
use crate::interrupt::{CancellationToken, Interrupted};
use crate::model::{Checkpoint, Record};
use crate::tracker::{WorkItemSource, build_id_query};
use crate::util::fingerprint;

pub struct Retrieval<'a, S> {
    source: &'a mut S,
    store: &'a CheckpointStore,
    cancel: &'a CancellationToken,
    chunk_size: usize,
}

impl<'a, S: WorkItemSource> Retrieval<'a, S> {
    pub fn new(
        source: &'a mut S,
        store: &'a CheckpointStore,
        cancel: &'a CancellationToken,
        chunk_size: usize,
    ) -> Self {
        Self {
            source,
            store,
            cancel,
            chunk_size,
        }
    }

    pub fn fetch(&mut self, identifiers: &[String], resume: Option<Checkpoint>) -> Result<Vec<Record>> {
        if self.chunk_size == 0 {
            bail!("chunk size must be positive");
        }

        let (start, mut items) = match resume {
            Some(checkpoint) if resumable(&checkpoint, identifiers) => {
                (checkpoint.index, checkpoint.items)
            }
            Some(_) => {
                debug!("checkpoint does not match identifiers, starting from zero");
                (0, Vec::new())
            }
            None => (0, Vec::new()),
        };

        let mut cursor = start;
        let remaining = &identifiers[cursor..];
        let chunk_count = remaining.len().div_ceil(self.chunk_size);
        info!(
            cursor,
            total = identifiers.len(),
            chunks = chunk_count,
            chunk_size = self.chunk_size,
            "fetching work items"
        );

        for (chunk_idx, chunk) in remaining.chunks(self.chunk_size).enumerate() {
            let query = build_id_query(chunk);
            info!(
                chunk = chunk_idx + 1,
                chunks = chunk_count,
                first = %chunk[0],
                last = %chunk[chunk.len() - 1],
                "GET"
            );

            let records = match self.source.search(&query, self.chunk_size) {
                Ok(records) => records,
                Err(err) => {
                    if cursor > start {
                        self.save_progress(identifiers, cursor, items)?;
                    }
                    return Err(err).with_context(|| {
                        format!("failed to fetch identifiers {}..{}", chunk[0], chunk[chunk.len() - 1])
                    });
                }
            };
            for record in records {
                debug!(
                    n = items.len(),
                    id = %record.id,
                    title = %record.title,
                    "fetched work item"
                );
                items.push(record);
            }
            cursor += chunk.len();

            if self.cancel.is_cancelled() {
                return self.stop(identifiers, cursor, items);
            }
        }

        Ok(items)
    }

    fn save_progress(&self, identifiers: &[String], cursor: usize, items: Vec<Record>) -> Result<()> {
        let checkpoint = self.store.snapshot(identifiers, cursor, items);
        let section = self.cancel.critical_section();
        self.store.save(&checkpoint)?;
        let _ = section.finish();
        Ok(())
    }

    fn stop(&self, identifiers: &[String], cursor: usize, items: Vec<Record>) -> Result<Vec<Record>> {
        self.save_progress(identifiers, cursor, items)?;
        Err(Interrupted {
            checkpoint_path: self.store.path().to_path_buf(),
            cursor,
            total: identifiers.len(),
        }
        .into())
    }
}

fn resumable(checkpoint: &Checkpoint, identifiers: &[String]) -> bool {
    checkpoint.index <= identifiers.len() && checkpoint.hash == fingerprint(identifiers)
}

//! Store-mediated dispatch.
//!
//! The coordinator publishes both operands, the row chunks of the left operand
//! and finally a [RunManifest]. Computing nodes then walk the chunk ordinals in
//! ascending order and take work through [ChunkQueue]: an ordinal is claimed
//! with a put-if-absent into the claim table, so exactly one node multiplies
//! each chunk, and its result is recorded under the same ordinal.

use crate::error::{Error, Result};
use crate::kernel::multiply_chunk;
use crate::matrix::{Chunk, Element, Matrix, PartialResult};
use crate::membership::NodeId;
use crate::partition::split;
use crate::store::{
    expect_value, put_value_if_absent, Namespace, SharedStore, Store,
};
use crate::visibility::{wait_for_key, wait_for_keys, PollPolicy};
use crate::warnings::RuntimeWarning;

use serde::{Deserialize, Serialize};

/// Operand tables and the manifest live under this key.
pub const OPERAND_KEY: usize = 0;

/// What every node needs to know about a published run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunManifest {
    pub a_rows: usize,
    pub a_cols: usize,
    pub b_rows: usize,
    pub b_cols: usize,
    pub chunk_height: usize,
    pub num_chunks: usize,
}

impl RunManifest {
    /// Keys a node must see before it may read any chunk
    pub fn prerequisites() -> [(Namespace, usize); 2] {
        [
            (Namespace::Manifest, OPERAND_KEY),
            (Namespace::OperandB, OPERAND_KEY),
        ]
    }

    pub fn result_keys(&self) -> Vec<(Namespace, usize)> {
        (0..self.num_chunks)
            .map(|ordinal| (Namespace::ResultTable, ordinal))
            .collect()
    }
}

fn publish_once<V: Serialize>(store: &Store, namespace: Namespace, key: usize, value: &V) -> Result<()> {
    if put_value_if_absent(store, namespace, key, value)? {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{}[{}] is already published, this job id was used by an earlier run",
            namespace, key
        )))
    }
}

/// Publish the operands and the chunks of `a`. Coordinator only.
///
/// Every entry is written exactly once; the manifest goes last.
#[tracing::instrument(skip_all, fields(a = ?a.shape(), b = ?b.shape(), chunk_height = chunk_height))]
pub fn publish<T: Element>(
    store: &Store,
    a: &Matrix<T>,
    b: &Matrix<T>,
    chunk_height: usize,
) -> Result<RunManifest> {
    if a.cols() != b.rows() {
        return Err(Error::shape(
            "publish",
            format!(
                "operand A is {}x{} but operand B is {}x{}",
                a.rows(),
                a.cols(),
                b.rows(),
                b.cols()
            ),
        ));
    }
    let chunks = split(a, chunk_height)?;
    publish_once(store, Namespace::OperandA, OPERAND_KEY, a)?;
    publish_once(store, Namespace::OperandB, OPERAND_KEY, b)?;
    for chunk in &chunks {
        publish_once(store, Namespace::ChunkTable, chunk.ordinal, chunk)?;
    }
    let manifest = RunManifest {
        a_rows: a.rows(),
        a_cols: a.cols(),
        b_rows: b.rows(),
        b_cols: b.cols(),
        chunk_height,
        num_chunks: chunks.len(),
    };
    publish_once(store, Namespace::Manifest, OPERAND_KEY, &manifest)?;
    tracing::info!(num_chunks = manifest.num_chunks, "published operands and chunks");
    Ok(manifest)
}

/// Wait for the manifest and operand B, then read them.
#[tracing::instrument(skip_all)]
pub fn await_operands<T: Element>(store: &Store, policy: &PollPolicy) -> Result<(RunManifest, Matrix<T>)> {
    wait_for_keys(store, &RunManifest::prerequisites(), policy)?;
    let manifest: RunManifest = expect_value(store, Namespace::Manifest, OPERAND_KEY)?;
    let b: Matrix<T> = expect_value(store, Namespace::OperandB, OPERAND_KEY)?;
    if b.shape() != (manifest.b_rows, manifest.b_cols) {
        return Err(Error::shape(
            "await_operands",
            format!(
                "manifest announces a {}x{} operand B, store holds {}x{}",
                manifest.b_rows,
                manifest.b_cols,
                b.rows(),
                b.cols()
            ),
        ));
    }
    Ok((manifest, b))
}

/// Work queue over the chunk ordinals of one run, with atomic claims.
pub struct ChunkQueue<'a> {
    store: &'a Store,
    node: &'a NodeId,
    num_chunks: usize,
    next: usize,
}

impl<'a> ChunkQueue<'a> {
    pub fn new(store: &'a Store, node: &'a NodeId, num_chunks: usize) -> ChunkQueue<'a> {
        ChunkQueue {
            store,
            node,
            num_chunks,
            next: 0,
        }
    }

    /// Claim the next ordinal that has neither a result nor another owner.
    pub fn claim_next(&mut self) -> Result<Option<usize>> {
        while self.next < self.num_chunks {
            let ordinal = self.next;
            self.next += 1;
            if self.store.contains_key(Namespace::ResultTable, ordinal)? {
                continue;
            }
            if put_value_if_absent(self.store, Namespace::ClaimTable, ordinal, self.node)? {
                tracing::debug!(ordinal, "claimed chunk");
                return Ok(Some(ordinal));
            }
        }
        Ok(None)
    }

    /// Record the result for a claimed ordinal
    pub fn complete<T: Element>(&self, partial: &PartialResult<T>) -> Result<bool> {
        record_result(self.store, partial)
    }
}

/// Write `partial` to the result table unless its ordinal already has a result.
///
/// Returns whether this call wrote the entry. Recording the same ordinal
/// twice keeps the first value, which is identical for a deterministic kernel.
pub fn record_result<T: Element>(store: &Store, partial: &PartialResult<T>) -> Result<bool> {
    let written = put_value_if_absent(store, Namespace::ResultTable, partial.ordinal, partial)?;
    if !written {
        RuntimeWarning::LostResultRace(partial.ordinal).print();
    }
    Ok(written)
}

/// Claim, multiply and record chunks until none are left. Returns the
/// ordinals this node computed, in the order it computed them.
#[tracing::instrument(skip_all, fields(node = %node, num_chunks = manifest.num_chunks))]
pub fn compute_chunks<T: Element>(
    store: &Store,
    node: &NodeId,
    manifest: &RunManifest,
    b: &Matrix<T>,
    policy: &PollPolicy,
) -> Result<Vec<usize>> {
    let mut queue = ChunkQueue::new(store, node, manifest.num_chunks);
    let mut computed = vec![];
    while let Some(ordinal) = queue.claim_next()? {
        wait_for_key(store, Namespace::ChunkTable, ordinal, policy)?;
        let chunk: Chunk<T> = expect_value(store, Namespace::ChunkTable, ordinal)?;
        if chunk.ordinal != ordinal {
            return Err(Error::dependency(
                format!("get {}[{}]", Namespace::ChunkTable, ordinal),
                format!("entry is tagged with ordinal {}", chunk.ordinal),
            ));
        }
        let partial = multiply_chunk(&chunk, b)?;
        queue.complete(&partial)?;
        tracing::debug!(ordinal, rows = chunk.rows(), "computed chunk");
        computed.push(ordinal);
    }
    tracing::info!(computed = computed.len(), "no chunks left to claim");
    Ok(computed)
}

/// Wait for every result of the run and read them in ordinal order.
#[tracing::instrument(skip_all, fields(num_chunks = manifest.num_chunks))]
pub fn collect_results<T: Element>(
    store: &Store,
    manifest: &RunManifest,
    policy: &PollPolicy,
) -> Result<Vec<PartialResult<T>>> {
    wait_for_keys(store, &manifest.result_keys(), policy)?;
    (0..manifest.num_chunks)
        .map(|ordinal| expect_value(store, Namespace::ResultTable, ordinal))
        .collect()
}

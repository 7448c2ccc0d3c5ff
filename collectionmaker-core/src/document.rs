//! Synthetic document generation
//!
//! Identity fields are a pure function of a run-wide sequence index so that
//! repeated runs with the same shape hit the same keys. Payloads are random
//! filler and differ on every call.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Smallest byte value used in payloads (`!`)
pub const PAYLOAD_MIN_BYTE: u8 = 33;
/// Largest byte value used in payloads (`z`)
pub const PAYLOAD_MAX_BYTE: u8 = 122;

/// A single synthetic document as sent to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Primary key, hex SHA-256 of the global index
    #[serde(rename = "_key")]
    pub key: String,
    /// Hex SHA-256 of `"SHA"` followed by the global index
    #[serde(rename = "sha")]
    pub content_tag: String,
    /// Random printable filler
    pub payload: String,
}

/// Run-wide sequence number of a document.
///
/// All inputs are 1-based; `item_index` lies in `1..=batch_size`.
#[must_use]
pub const fn global_index(
    worker_id: u64,
    batch_index: u64,
    item_index: u64,
    batches_per_worker: u64,
    batch_size: u64,
) -> u64 {
    (worker_id * batches_per_worker + batch_index - 1) * batch_size + item_index
}

/// Primary key for a global index
#[must_use]
pub fn document_key(global_index: u64) -> String {
    sha256_hex(global_index.to_string().as_bytes())
}

/// Content tag for a global index
#[must_use]
pub fn content_tag(global_index: u64) -> String {
    sha256_hex(format!("SHA{global_index}").as_bytes())
}

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// Random string of `len` bytes drawn uniformly from `33..=122`
pub fn random_payload<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.gen_range(PAYLOAD_MIN_BYTE..=PAYLOAD_MAX_BYTE)))
        .collect()
}

/// Produces the documents of one run shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentGenerator {
    batches_per_worker: u64,
    batch_size: u64,
    payload_size: usize,
}

impl DocumentGenerator {
    /// Create a generator for a run with the given shape
    #[must_use]
    pub const fn new(batches_per_worker: u64, batch_size: u64, payload_size: usize) -> Self {
        Self {
            batches_per_worker,
            batch_size,
            payload_size,
        }
    }

    /// Documents per batch
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Build one document
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        worker_id: u64,
        batch_index: u64,
        item_index: u64,
    ) -> Document {
        let index = global_index(
            worker_id,
            batch_index,
            item_index,
            self.batches_per_worker,
            self.batch_size,
        );
        Document {
            key: document_key(index),
            content_tag: content_tag(index),
            payload: random_payload(rng, self.payload_size),
        }
    }

    /// Append a full batch to `buffer`.
    ///
    /// The buffer is expected to be empty; its capacity is reused.
    pub fn fill_batch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        worker_id: u64,
        batch_index: u64,
        buffer: &mut Vec<Document>,
    ) {
        buffer.extend(
            (1..=self.batch_size).map(|item| self.generate(rng, worker_id, batch_index, item)),
        );
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Correlation identifier linking a request to its reply.
///
/// A 128-bit token: the high 64 bits identify the issuing client instance
/// (random per client), the low 64 bits are that client's call sequence.
/// Two live clients therefore never mint the same id, and one client never
/// reuses an id while a call with it may still be in flight.
///
/// Rendered in hyphenated UUID form for logs, e.g.
/// `5f0c1a2b-33d4-4e5f-0000-000000000007`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u128);

impl CorrelationId {
    /// Width of the id on the wire.
    pub const WIRE_LEN: usize = 16;

    /// Compose an id from a client instance id and a sequence number.
    pub const fn new(client: u64, sequence: u64) -> Self {
        Self(((client as u128) << 64) | sequence as u128)
    }

    /// Generate a random, standalone id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_u128())
    }

    /// The issuing client's instance id.
    pub const fn client(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// The per-client sequence number.
    pub const fn sequence(&self) -> u64 {
        self.0 as u64
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// Big-endian wire representation.
    pub const fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        self.0.to_be_bytes()
    }

    pub const fn from_bytes(bytes: [u8; Self::WIRE_LEN]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }
}

impl From<u128> for CorrelationId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Uuid::from_u128(self.0).hyphenated(), f)
    }
}

/// Mints correlation ids for a single client.
///
/// The client half is drawn once from a v4 UUID; the sequence starts at 1 and
/// only moves forward.
#[derive(Debug)]
pub(crate) struct CorrelationIdGenerator {
    client: u64,
    next: AtomicU64,
}

impl CorrelationIdGenerator {
    pub(crate) fn new() -> Self {
        // ---
        let (high, low) = Uuid::new_v4().as_u64_pair();
        Self::with_client(high ^ low)
    }

    pub(crate) fn with_client(client: u64) -> Self {
        Self {
            client,
            next: AtomicU64::new(1),
        }
    }

    pub(crate) fn client(&self) -> u64 {
        self.client
    }

    pub(crate) fn next_id(&self) -> CorrelationId {
        // ---
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId::new(self.client, sequence)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = CorrelationId::generate();
        let id2 = CorrelationId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_format() {
        // ---
        let id = CorrelationId::generate();
        let s = id.to_string();
        assert_eq!(s.len(), 36); // Standard UUID format
    }

    #[test]
    fn test_halves() {
        // ---
        let id = CorrelationId::new(0xdead_beef, 42);
        assert_eq!(id.client(), 0xdead_beef);
        assert_eq!(id.sequence(), 42);
        assert_eq!(CorrelationId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_generator_sequences_within_client() {
        // ---
        let ids = CorrelationIdGenerator::with_client(7);
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a.client(), 7);
        assert_eq!(b.client(), 7);
        assert_eq!(b.sequence(), a.sequence() + 1);
    }

    #[test]
    fn test_generator_concurrent_ids_are_distinct() {
        // ---
        let ids = std::sync::Arc::new(CorrelationIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id minted twice: {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}

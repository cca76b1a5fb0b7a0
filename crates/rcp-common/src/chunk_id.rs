use std::hash::{Hash, Hasher};

/// Derives the deterministic `chunk_id` from `(source_id, section_number, chunk_index)`.
///
/// A stable FNV-1a style hash is used rather than `std::collections::hash_map`'s
/// randomized default hasher, since chunk ids must be reproducible across
/// processes and across runs (§3, §4.2, §8 chunker idempotence property).
pub fn derive_chunk_id(source_id: &str, section_number: &str, chunk_index: usize) -> String {
    let mut hasher = StableHasher::new();
    source_id.hash(&mut hasher);
    0u8.hash(&mut hasher); // field separator, avoids "ab"+"c" == "a"+"bc" collisions
    section_number.hash(&mut hasher);
    0u8.hash(&mut hasher);
    chunk_index.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// FNV-1a 64-bit hasher. Deterministic across processes and platforms, unlike
/// `std::collections::hash_map::DefaultHasher` (whose algorithm is explicitly
/// unspecified and randomly seeded by default in most embeddings).
struct StableHasher(u64);

impl StableHasher {
    fn new() -> Self {
        Self(0xcbf29ce484222325)
    }
}

impl Hasher for StableHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = derive_chunk_id("doc-1", "4.1", 0);
        let b = derive_chunk_id("doc-1", "4.1", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_fields() {
        let a = derive_chunk_id("doc-1", "4.1", 0);
        let b = derive_chunk_id("doc-14", "1", 0);
        assert_ne!(a, b, "field separator must prevent concatenation collisions");
    }

    #[test]
    fn distinguishes_chunk_index() {
        let a = derive_chunk_id("doc-1", "4.1", 0);
        let b = derive_chunk_id("doc-1", "4.1", 1);
        assert_ne!(a, b);
    }
}

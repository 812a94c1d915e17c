//! Chained hash cache of surface-evaluated triangle midpoints.
//!
//! Keyed by the unordered triple of vertex ids; holds the midpoint
//! coordinates and the close-to-boundary flag so swaps and splits can
//! re-seed triangles without re-evaluating the surface.

use facet_kernel_math::Point3;

/// Primes just below 2^n, used to size the bucket array.
const PRIME_TAB: [usize; 25] = [
    127, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749, 65521, 131071, 262139, 524287, 1048573,
    2097143, 4194301, 8388593, 16777213, 33554393, 67108859, 134217689, 268435399, 536870909,
    1073741789, 2147483647,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Key([i32; 3]);

impl Key {
    fn new(i0: i32, i1: i32, i2: i32) -> Self {
        let lo = i0.min(i1).min(i2);
        let hi = i0.max(i1).max(i2);
        Self([lo, i0 + i1 + i2 - lo - hi, hi])
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: Key,
    close: i8,
    xyz: Point3,
}

/// The midpoint cache.
#[derive(Debug, Clone)]
pub struct MidpointHash {
    buckets: Vec<Vec<Entry>>,
}

impl MidpointHash {
    /// Create a cache with at least `capacity` buckets (rounded up to
    /// the next tabulated prime).
    pub fn new(capacity: usize) -> Self {
        let n = PRIME_TAB
            .iter()
            .find(|&&p| p >= capacity)
            .copied()
            .unwrap_or(capacity);
        Self {
            buckets: vec![Vec::new(); n],
        }
    }

    fn bucket(&self, key: &Key) -> usize {
        (key.0[0] as i64 + key.0[1] as i64 + key.0[2] as i64) as usize % self.buckets.len()
    }

    /// Look up the payload for the vertex triple, in any order.
    pub fn find(&self, i0: i32, i1: i32, i2: i32) -> Option<(i8, Point3)> {
        let key = Key::new(i0, i1, i2);
        self.buckets[self.bucket(&key)]
            .iter()
            .find(|e| e.key == key)
            .map(|e| (e.close, e.xyz))
    }

    /// Insert a payload; returns `true` if the triple was already
    /// present (the stored payload is kept).
    pub fn insert(&mut self, i0: i32, i1: i32, i2: i32, close: i8, xyz: Point3) -> bool {
        let key = Key::new(i0, i1, i2);
        let b = self.bucket(&key);
        if self.buckets[b].iter().any(|e| e.key == key) {
            return true;
        }
        self.buckets[b].push(Entry { key, close, xyz });
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_any_order() {
        let mut h = MidpointHash::new(256);
        let p = Point3::new(1.0, 2.0, 3.0);
        assert!(!h.insert(5, 9, 2, 1, p));
        for (a, b, c) in [(5, 9, 2), (9, 2, 5), (2, 5, 9), (2, 9, 5)] {
            let (close, xyz) = h.find(a, b, c).unwrap();
            assert_eq!(close, 1);
            assert_eq!(xyz, p);
        }
        assert!(h.find(5, 9, 3).is_none());
    }

    #[test]
    fn test_insert_keeps_first_payload() {
        let mut h = MidpointHash::new(1);
        let p = Point3::new(1.0, 0.0, 0.0);
        let q = Point3::new(2.0, 0.0, 0.0);
        assert!(!h.insert(1, 2, 3, 0, p));
        assert!(h.insert(3, 1, 2, 1, q));
        let (close, xyz) = h.find(1, 2, 3).unwrap();
        assert_eq!(close, 0);
        assert_eq!(xyz, p);
    }

    #[test]
    fn test_prime_sizing() {
        let h = MidpointHash::new(256);
        assert_eq!(h.buckets.len(), 509);
    }
}

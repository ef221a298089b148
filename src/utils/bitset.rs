//! A growable bit vector keyed by small dense indices.
//!
//! Graph walks track visited nodes by their `_idx`, which is dense and small for every
//! node of a compilation. The set grows on demand, so callers do not need to know the
//! node count of the compilation up front.
//!
//! # Example
//!
//! ```rust
//! use optoscope::utils::BitSet;
//!
//! let mut set = BitSet::new(64);
//! assert!(set.insert(3));
//! assert!(!set.insert(3));
//! assert!(set.insert(1000));
//!
//! assert!(set.contains(1000));
//! assert_eq!(set.count(), 2);
//! assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 1000]);
//! ```

/// A bit vector for visited-set tracking.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet {
    /// The bits, stored as a vector of words.
    words: Vec<u64>,
}

impl BitSet {
    /// Creates a new empty bit set with room for `capacity` bits before it has to grow.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
        }
    }

    /// Number of bits the set can hold without growing.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len() * 64
    }

    /// Returns `true` if the bit set has no bits set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Sets the bit at `index`, growing the set if needed.
    ///
    /// Returns `true` if the bit was previously clear.
    pub fn insert(&mut self, index: usize) -> bool {
        let word = index / 64;
        let bit = index % 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let old = self.words[word];
        self.words[word] |= 1u64 << bit;
        old != self.words[word]
    }

    /// Returns `true` if the bit at `index` is set.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    /// Returns the number of bits set.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns an iterator over the indices of set bits in ascending order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            set: self,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Iterator over the set bits in a `BitSet`.
pub struct BitSetIter<'a> {
    set: &'a BitSet,
    word_idx: usize,
    /// Remaining bits of the current word
    current: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * 64 + bit);
            }
            self.word_idx += 1;
            self.current = *self.set.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = BitSet::new(100);
        assert!(bs.is_empty());
        assert_eq!(bs.count(), 0);

        bs.insert(0);
        bs.insert(50);
        bs.insert(99);

        assert!(!bs.is_empty());
        assert_eq!(bs.count(), 3);
        assert!(bs.contains(0));
        assert!(bs.contains(50));
        assert!(bs.contains(99));
        assert!(!bs.contains(1));
        assert!(!bs.contains(5000));
    }

    #[test]
    fn test_bitset_grows() {
        let mut bs = BitSet::new(0);
        assert_eq!(bs.capacity(), 0);
        assert!(bs.insert(130));
        assert!(bs.capacity() >= 131);
        assert!(bs.contains(130));
        assert!(!bs.insert(130));
    }

    #[test]
    fn test_bitset_iter() {
        let mut bs = BitSet::new(100);
        bs.insert(5);
        bs.insert(42);
        bs.insert(63);
        bs.insert(64);
        bs.insert(99);

        let bits: Vec<_> = bs.iter().collect();
        assert_eq!(bits, vec![5, 42, 63, 64, 99]);
        assert_eq!(format!("{bs:?}"), "{5, 42, 63, 64, 99}");
    }
}

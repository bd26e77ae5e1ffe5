//! Leaf sets of stemma clades as packed bits.
//!
//! Bit `i` stands for the `i`-th witness in name order, so clades of two
//! stemmata over the same witnesses compare word by word.

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// An empty set with room for `words * 64` leaves.
    ///
    /// ```
    /// # use rhm_stemma::bitset::Bitset;
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.count_ones(), 0);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Words needed for `leaves` bits.
    pub fn words_for(leaves: usize) -> usize {
        leaves.div_ceil(64)
    }

    #[inline]
    pub fn set(&mut self, idx: usize) {
        self.0[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0[idx >> 6] & (1u64 << (idx & 63)) != 0
    }

    /// Union in place.
    ///
    /// ```
    /// # use rhm_stemma::bitset::Bitset;
    /// let mut clade = Bitset::zeros(1);
    /// clade.set(0);
    /// let mut other = Bitset::zeros(1);
    /// other.set(3);
    /// clade.or_assign(&other);
    /// assert_eq!(clade.0[0], 0b1001);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The other side of the split, over `leaves` leaves. Padding bits stay 0.
    pub fn complement(&self, leaves: usize) -> Bitset {
        let mut out = Bitset(self.0.iter().map(|w| !w).collect());
        let tail = leaves & 63;
        if let Some(last) = out.0.last_mut() {
            if tail != 0 {
                *last &= (1u64 << tail) - 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_contains() {
        let mut bs = Bitset::zeros(2);
        bs.set(0);
        bs.set(70);
        assert!(bs.contains(0));
        assert!(bs.contains(70));
        assert!(!bs.contains(1));
        assert_eq!(bs.count_ones(), 2);
    }

    #[test]
    fn complement_masks_padding() {
        let mut bs = Bitset::zeros(1);
        bs.set(0);
        bs.set(1);
        assert_eq!(bs.complement(4).0[0], 0b1100);

        let mut wide = Bitset::zeros(Bitset::words_for(70));
        wide.set(69);
        let c = wide.complement(70);
        assert_eq!(c.count_ones(), 69);
        assert!(!c.contains(69));
    }

    #[test]
    fn complement_of_full_words() {
        let bs = Bitset::zeros(1);
        assert_eq!(bs.complement(64).count_ones(), 64);
    }
}

use core::fmt;

/// A buffer (re)assembler for the fragments of a single datagram.
///
/// Each fragment covers a range of the *uncompressed* datagram. For most fragments this is simply
/// the length of their data. The first fragment differs: its data still contains the compressed
/// headers, so it covers more of the datagram than it carries octets. Hence the covered length is
/// passed separately from the data on insertion.
///
/// Fragments are kept ordered by offset. Overlapping ranges are refused when inserted, which
/// makes the buffer complete exactly when the ranges are contiguous from zero to the datagram
/// size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assembler {
    size: usize,
    fragments: Vec<Fragment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Fragment {
    offset: usize,
    covered: usize,
    data: Vec<u8>,
}

/// A contiguous chunk of absent data, followed by a contiguous chunk of present data.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contig {
    /// Octets missing before the data.
    pub hole_size: usize,
    /// Octets present.
    pub data_size: usize,
}

/// The outcome of a successful insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insert {
    /// The fragment was stored.
    Added,
    /// An identical range was already stored; the new copy was discarded.
    Duplicate,
}

/// A fragment conflicted with the ones already stored.
///
/// Either it overlapped a stored range without being an exact duplicate, or it reached beyond
/// the announced datagram size. Nothing was modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    /// Offset of the refused fragment.
    pub offset: usize,
    /// Covered length of the refused fragment.
    pub covered: usize,
}

impl Contig {
    fn has_hole(&self) -> bool {
        self.hole_size != 0
    }

    fn has_data(&self) -> bool {
        self.data_size != 0
    }
}

impl fmt::Display for Contig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.has_hole() { write!(f, "({})", self.hole_size)?; }
        if self.has_hole() && self.has_data() { write!(f, " ")?; }
        if self.has_data() { write!(f, "{}",   self.data_size)?; }
        Ok(())
    }
}

impl fmt::Display for Assembler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[ ")?;
        for contig in self.contigs() {
            write!(f, "{} ", contig)?;
        }
        let missing = self.size.saturating_sub(self.covered_end());
        if missing != 0 {
            write!(f, "({}) ", missing)?;
        }
        write!(f, "]")
    }
}

impl Assembler {
    /// Create an empty assembler for a datagram of the given size.
    pub fn new(size: usize) -> Self {
        Assembler {
            size,
            fragments: Vec::new(),
        }
    }

    /// Return whether no fragment has been stored.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The number of stored fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Add a fragment covering `offset..offset + covered` of the datagram.
    ///
    /// ## Example
    ///
    /// ```
    /// # use lowpan::storage::assembler::{Assembler, Insert};
    /// let mut asm = Assembler::new(16);
    ///
    /// // Add eight bytes not at the start.
    /// assert_eq!(asm.insert(8, 8, &[0; 8]), Ok(Insert::Added));
    /// assert!(!asm.is_entire());
    /// // The first fragment is shorter than the range it covers.
    /// assert_eq!(asm.insert(0, 8, &[0; 4]), Ok(Insert::Added));
    /// assert!(asm.is_entire());
    /// ```
    pub fn insert(&mut self, offset: usize, covered: usize, data: &[u8]) -> Result<Insert, Overlap> {
        let overlap = Overlap { offset, covered };
        let end = offset.checked_add(covered).ok_or(overlap)?;
        if end > self.size {
            return Err(overlap);
        }

        let index = match self.fragments.binary_search_by_key(&offset, |frag| frag.offset) {
            Ok(index) => {
                return if self.fragments[index].covered == covered {
                    Ok(Insert::Duplicate)
                } else {
                    Err(overlap)
                };
            },
            Err(index) => index,
        };

        if let Some(before) = index.checked_sub(1).map(|idx| &self.fragments[idx]) {
            if before.offset + before.covered > offset {
                return Err(overlap);
            }
        }

        if let Some(after) = self.fragments.get(index) {
            if after.offset < end {
                return Err(overlap);
            }
        }

        self.fragments.insert(index, Fragment {
            offset,
            covered,
            data: data.to_vec(),
        });
        Ok(Insert::Added)
    }

    /// Return whether the fragments cover the whole datagram.
    pub fn is_entire(&self) -> bool {
        let mut contigs = self.contigs();
        match (contigs.next(), contigs.next()) {
            (Some(contig), None) => !contig.has_hole() && contig.data_size >= self.size,
            _ => false,
        }
    }

    /// Iterate over the holes and data of the datagram, in order.
    pub fn contigs(&self) -> impl Iterator<Item=Contig> + '_ {
        let mut fragments = self.fragments.iter().peekable();
        let mut position = 0;
        core::iter::from_fn(move || {
            let first = fragments.next()?;
            let hole_size = first.offset - position;
            let mut end = first.offset + first.covered;
            while let Some(next) = fragments.next_if(|next| next.offset == end) {
                end = next.offset + next.covered;
            }
            let data_size = end - first.offset;
            position = end;
            Some(Contig { hole_size, data_size })
        })
    }

    /// The data of each stored fragment, in offset order.
    pub fn fragments(&self) -> impl Iterator<Item=&[u8]> + '_ {
        self.fragments.iter().map(|frag| &frag.data[..])
    }

    /// Concatenate the data of all fragments, in offset order.
    ///
    /// The result is only meaningful once the assembler [`is_entire`].
    ///
    /// [`is_entire`]: #method.is_entire
    pub fn assemble(&self) -> Vec<u8> {
        let len = self.fragments.iter().map(|frag| frag.data.len()).sum();
        let mut datagram = Vec::with_capacity(len);
        for frag in &self.fragments {
            datagram.extend_from_slice(&frag.data);
        }
        datagram
    }

    fn covered_end(&self) -> usize {
        self.fragments.last().map_or(0, |frag| frag.offset + frag.covered)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn contigs(asm: &Assembler) -> Vec<(usize, usize)> {
        asm.contigs()
            .map(|contig| (contig.hole_size, contig.data_size))
            .collect()
    }

    #[test]
    fn empty() {
        let asm = Assembler::new(24);
        assert!(asm.is_empty());
        assert!(!asm.is_entire());
        assert_eq!(asm.to_string(), "[ (24) ]");
    }

    #[test]
    fn out_of_order() {
        let mut asm = Assembler::new(24);
        assert_eq!(asm.insert(16, 8, &[3; 8]), Ok(Insert::Added));
        assert_eq!(contigs(&asm), vec![(16, 8)]);
        assert_eq!(asm.insert(0, 8, &[1; 2]), Ok(Insert::Added));
        assert_eq!(contigs(&asm), vec![(0, 8), (8, 8)]);
        assert_eq!(asm.to_string(), "[ 8 (8) 8 ]");
        assert!(!asm.is_entire());
        assert_eq!(asm.fragments().next(), Some(&[1, 1][..]));

        assert_eq!(asm.insert(8, 8, &[2; 8]), Ok(Insert::Added));
        assert_eq!(contigs(&asm), vec![(0, 24)]);
        assert!(asm.is_entire());

        let mut expected = vec![1; 2];
        expected.extend_from_slice(&[2; 8]);
        expected.extend_from_slice(&[3; 8]);
        assert_eq!(asm.assemble(), expected);
        assert_eq!(asm.fragments().count(), 3);
    }

    #[test]
    fn duplicate() {
        let mut asm = Assembler::new(16);
        assert_eq!(asm.insert(8, 8, &[2; 8]), Ok(Insert::Added));
        assert_eq!(asm.insert(8, 8, &[2; 8]), Ok(Insert::Duplicate));
        assert_eq!(asm.len(), 1);
    }

    #[test]
    fn overlap() {
        let mut asm = Assembler::new(32);
        assert_eq!(asm.insert(8, 8, &[0; 8]), Ok(Insert::Added));
        // Same offset, different length.
        assert_eq!(asm.insert(8, 16, &[0; 16]), Err(Overlap { offset: 8, covered: 16 }));
        // Reaches into the stored fragment from before.
        assert_eq!(asm.insert(0, 9, &[0; 9]), Err(Overlap { offset: 0, covered: 9 }));
        // Starts within the stored fragment.
        assert_eq!(asm.insert(12, 8, &[0; 8]), Err(Overlap { offset: 12, covered: 8 }));
        // Beyond the datagram.
        assert_eq!(asm.insert(24, 16, &[0; 16]), Err(Overlap { offset: 24, covered: 16 }));
        assert_eq!(asm.len(), 1);
        assert_eq!(contigs(&asm), vec![(8, 8)]);
    }

    #[test]
    fn tail_not_entire() {
        let mut asm = Assembler::new(20);
        assert_eq!(asm.insert(0, 16, &[0; 10]), Ok(Insert::Added));
        assert!(!asm.is_entire());
        assert_eq!(asm.to_string(), "[ 16 (4) ]");
        assert_eq!(asm.insert(16, 4, &[0; 4]), Ok(Insert::Added));
        assert!(asm.is_entire());
        assert_eq!(asm.assemble().len(), 14);
    }
}

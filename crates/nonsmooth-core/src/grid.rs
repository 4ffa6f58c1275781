//! Offset arithmetic shared by the block storages.
//!
//! Block boundaries are stored as cumulative end offsets: block `k` covers
//! `offsets[k - 1]..offsets[k]`, with an implicit leading zero.

/// Cumulative end offsets from block sizes.
pub(crate) fn cumulative(sizes: &[usize]) -> Vec<usize> {
    sizes
        .iter()
        .scan(0, |acc, &s| {
            *acc += s;
            Some(*acc)
        })
        .collect()
}

/// Block sizes from cumulative end offsets.
pub(crate) fn sizes(offsets: &[usize]) -> Vec<usize> {
    let mut prev = 0;
    offsets
        .iter()
        .map(|&end| {
            let s = end - prev;
            prev = end;
            s
        })
        .collect()
}

/// First index and size of block `block`.
pub(crate) fn span(offsets: &[usize], block: usize) -> (usize, usize) {
    let start = if block == 0 { 0 } else { offsets[block - 1] };
    (start, offsets[block] - start)
}

/// Block owning `index` and the local coordinate inside it.
pub(crate) fn locate(offsets: &[usize], index: usize) -> Option<(usize, usize)> {
    let block = offsets.partition_point(|&end| end <= index);
    if block >= offsets.len() {
        return None;
    }
    Some((block, index - span(offsets, block).0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_round_trip() {
        let offsets = cumulative(&[2, 3, 1]);
        assert_eq!(offsets, vec![2, 5, 6]);
        assert_eq!(sizes(&offsets), vec![2, 3, 1]);
        assert_eq!(span(&offsets, 1), (2, 3));
    }

    #[test]
    fn locate_uses_end_offsets() {
        let offsets = [2, 5, 6];
        assert_eq!(locate(&offsets, 0), Some((0, 0)));
        assert_eq!(locate(&offsets, 2), Some((1, 0)));
        assert_eq!(locate(&offsets, 4), Some((1, 2)));
        assert_eq!(locate(&offsets, 5), Some((2, 0)));
        assert_eq!(locate(&offsets, 6), None);
    }
}

//! Rank-ordered byte-pair merging over a single pre-tokenized piece.
//!
//! Starts from one part per byte and repeatedly joins the adjacent pair whose
//! concatenated bytes have the lowest rank, left-most on ties, until no
//! adjacent pair has a rank. This is the same policy tiktoken uses.

use rustc_hash::FxHashMap;
use tracing::warn;

type Rank = u32;

/// Merge `piece` and return the boundaries of the final parts.
///
/// The result holds `(start, rank)` pairs followed by two sentinels, so
/// `piece[parts[i].0..parts[i + 1].0]` is the `i`-th part.
fn byte_pair_merge(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<(usize, Rank)> {
    let mut parts = Vec::with_capacity(piece.len() + 1);

    let mut min_rank: (Rank, usize) = (Rank::MAX, usize::MAX);
    for i in 0..piece.len() - 1 {
        let rank = *ranks.get(&piece[i..i + 2]).unwrap_or(&Rank::MAX);
        if rank < min_rank.0 {
            min_rank = (rank, i);
        }
        parts.push((i, rank));
    }
    parts.push((piece.len() - 1, Rank::MAX));
    parts.push((piece.len(), Rank::MAX));

    // Rank of the part that would result from joining parts[i] and parts[i + 1],
    // evaluated before parts[i + 1] is removed (hence the +3).
    let get_rank = |parts: &Vec<(usize, Rank)>, i: usize| {
        if (i + 3) < parts.len() {
            *ranks
                .get(&piece[parts[i].0..parts[i + 3].0])
                .unwrap_or(&Rank::MAX)
        } else {
            Rank::MAX
        }
    };

    while min_rank.0 != Rank::MAX {
        let i = min_rank.1;
        if i > 0 {
            parts[i - 1].1 = get_rank(&parts, i - 1);
        }
        parts[i].1 = get_rank(&parts, i);
        parts.remove(i + 1);

        min_rank = (Rank::MAX, usize::MAX);
        for (i, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, i);
            }
        }
    }

    parts
}

/// Encode one piece into ranks.
///
/// Parts without a rank can only be single bytes missing from the table; they
/// are dropped with a warning.
pub fn byte_pair_encode(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<Rank> {
    if piece.is_empty() {
        return Vec::new();
    }
    if let Some(&rank) = ranks.get(piece) {
        return vec![rank];
    }
    if piece.len() == 1 {
        warn!(byte = piece[0], "byte missing from rank table; dropping");
        return Vec::new();
    }

    byte_pair_merge(piece, ranks)
        .windows(2)
        .filter_map(|w| {
            let part = &piece[w[0].0..w[1].0];
            let rank = ranks.get(part).copied();
            if rank.is_none() {
                warn!(part = ?part, "byte missing from rank table; dropping");
            }
            rank
        })
        .collect()
}

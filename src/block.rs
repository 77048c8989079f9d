//! Blocked kernel composer
//!
//! Generic tiling logic shared by every instruction set: an operation over
//! an `(n, p)` iteration space is decomposed into a grid of fixed-size
//! blocks plus edge remainders, so the same decomposition works for any
//! kernel set. The visitor receives [`Tile::Block`] steps for the
//! vectorized path and [`Tile::Remainder`] steps for the scalar path.
//!
//! Block sizes are powers of two matched to a SIMD register's natural
//! width; alignment is bitmask truncation, never rounding up. Every element
//! of the logical space is visited exactly once: the aligned and remainder
//! paths are mutually exclusive and jointly exhaustive.

/// Largest multiple of `block` that fits in `len`
///
/// `block` must be a power of two.
///
/// # Examples
///
/// ```
/// use centella::block::aligned_len;
///
/// assert_eq!(aligned_len(19, 8), 16);
/// assert_eq!(aligned_len(16, 8), 16);
/// assert_eq!(aligned_len(7, 8), 0);
/// ```
#[inline]
pub fn aligned_len(len: usize, block: usize) -> usize {
    debug_assert!(block.is_power_of_two());
    len & !(block - 1)
}

/// Split `len` into `(aligned, remainder)` parts for a power-of-two `block`
#[inline]
pub fn split(len: usize, block: usize) -> (usize, usize) {
    let aligned = aligned_len(len, block);
    (aligned, len - aligned)
}

/// One step of a blocked decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    /// Vectorized path: columns `[col, col + block_n)` over the aligned
    /// inner prefix `[0, aligned_p)`
    Block {
        /// First column of the block
        col: usize,
    },
    /// Scalar path: columns `[col, col + cols)` over the inner range
    /// `[from, p)`
    Remainder {
        /// First column covered
        col: usize,
        /// Number of columns covered
        cols: usize,
        /// First inner index covered
        from: usize,
    },
}

/// Walk the blocked decomposition of an `(n, p)` space
///
/// For each aligned column block of width `block_n`: a [`Tile::Block`] over
/// the aligned-`p` prefix (skipped when `aligned_p == 0`), then a
/// [`Tile::Remainder`] over the trailing `p - aligned_p` inner elements
/// (skipped when nothing trails). The final `n - aligned_n` columns, too
/// narrow for a full block, get a single [`Tile::Remainder`] over the full
/// inner range.
///
/// The outer (row) dimension of matrix-matrix operations repeats this per
/// row in the dispatch layer, advancing by row strides.
#[inline]
pub fn compose<F>(n: usize, p: usize, block_n: usize, block_p: usize, mut visit: F)
where
    F: FnMut(Tile),
{
    let aligned_n = aligned_len(n, block_n);
    let aligned_p = aligned_len(p, block_p);

    let mut col = 0;
    while col < aligned_n {
        if aligned_p > 0 {
            visit(Tile::Block { col });
        }
        if p > aligned_p {
            visit(Tile::Remainder {
                col,
                cols: block_n,
                from: aligned_p,
            });
        }
        col += block_n;
    }
    if n > aligned_n {
        visit(Tile::Remainder {
            col: aligned_n,
            cols: n - aligned_n,
            from: 0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_len_truncates() {
        assert_eq!(aligned_len(0, 4), 0);
        assert_eq!(aligned_len(3, 4), 0);
        assert_eq!(aligned_len(4, 4), 4);
        assert_eq!(aligned_len(17, 4), 16);
        assert_eq!(aligned_len(31, 16), 16);
    }

    #[test]
    fn test_split_parts_sum_to_len() {
        for len in 0..100 {
            for block in [1usize, 2, 4, 8, 16] {
                let (a, r) = split(len, block);
                assert_eq!(a + r, len);
                assert_eq!(a % block, 0);
            }
        }
    }

    // Mark every (col, inner) cell each tile claims and check exact single
    // coverage of the whole n×p space.
    fn coverage(n: usize, p: usize, block_n: usize, block_p: usize) {
        let mut grid = vec![0u8; n * p];
        let aligned_p = aligned_len(p, block_p);
        compose(n, p, block_n, block_p, |tile| match tile {
            Tile::Block { col } => {
                for c in col..col + block_n {
                    for inner in 0..aligned_p {
                        grid[c * p + inner] += 1;
                    }
                }
            }
            Tile::Remainder { col, cols, from } => {
                for c in col..col + cols {
                    for inner in from..p {
                        grid[c * p + inner] += 1;
                    }
                }
            }
        });
        assert!(
            grid.iter().all(|&c| c == 1),
            "coverage hole or overlap at n={n} p={p} bn={block_n} bp={block_p}"
        );
    }

    #[test]
    fn test_every_cell_visited_exactly_once() {
        for n in 0..20 {
            for p in 0..20 {
                for (bn, bp) in [(1, 4), (4, 4), (8, 8), (2, 16), (8, 1), (1, 1)] {
                    coverage(n, p, bn, bp);
                }
            }
        }
    }

    #[test]
    fn test_exact_multiples_emit_no_remainders() {
        let mut blocks = 0;
        let mut remainders = 0;
        compose(16, 32, 8, 8, |tile| match tile {
            Tile::Block { .. } => blocks += 1,
            Tile::Remainder { .. } => remainders += 1,
        });
        assert_eq!(blocks, 2);
        assert_eq!(remainders, 0);
    }

    #[test]
    fn test_narrow_space_goes_fully_scalar() {
        let mut blocks = 0;
        let mut covered = 0;
        compose(3, 5, 8, 8, |tile| match tile {
            Tile::Block { .. } => blocks += 1,
            Tile::Remainder { cols, from, .. } => covered += cols * (5 - from),
        });
        assert_eq!(blocks, 0);
        assert_eq!(covered, 15);
    }
}

//! The position module holds the [Position] trait and its implementation for generalized indices.

/// The [Position] trait defines the interface of a generalized index within a binary tree.
/// A "Generalized Index" is calculated as `2^{depth} + index_at_depth`.
pub trait Position: Sized + Copy {
    /// Returns the depth of the [Position] within the tree.
    fn depth(&self) -> u64;
    /// Returns the index at depth of the [Position] within the tree.
    fn index_at_depth(&self) -> u128;
    /// Returns the left child [Position] relative to the current [Position].
    fn left(&self) -> Self;
    /// Returns the right child [Position] relative to the current [Position].
    fn right(&self) -> Self;
    /// Returns the parent [Position] relative to the current [Position].
    fn parent(&self) -> Self;
    /// Returns the rightmost [Position] that commits to the same trace index as the current [Position].
    fn right_index(&self, max_depth: u64) -> Self;
    /// Returns the trace index that the current [Position] commits to.
    fn trace_index(&self, max_depth: u64) -> u128;
    /// Returns the relative [Position] for an attack or defense move against the current [Position].
    fn make_move(&self, is_attack: bool) -> Self;
    /// Returns the [Position] at the same depth, one index to the right. `None` if the current
    /// [Position] is already the rightmost node at its depth.
    fn move_right(&self) -> Option<Self>;
    /// Returns true if the current [Position] is a defense against the claim at `parent`.
    fn right_of(&self, parent: Self) -> bool;
    /// Re-roots the current [Position] so that its ancestor at `ancestor_depth` becomes the root.
    fn relative_to_ancestor_at_depth(&self, ancestor_depth: u64) -> Option<Self>;

    /// Returns the [Position] of an attack against the current [Position].
    fn attack(&self) -> Self {
        self.make_move(true)
    }

    /// Returns the [Position] of a defense of the current [Position].
    fn defend(&self) -> Self {
        self.make_move(false)
    }
}

/// Computes a generalized index from a depth and index at depth.
///
/// ### Takes
/// - `depth`: The depth of the generalized index.
/// - `index_at_depth`: The index at depth of the generalized index.
///
/// ### Returns
/// - `u128`: The generalized index: `2^{depth} + index_at_depth`.
pub fn compute_gindex(depth: u64, index_at_depth: u128) -> u128 {
    2u128.pow(depth as u32) + index_at_depth
}

/// Implementation of the [Position] trait for the [std::u128] primitive type.
impl Position for u128 {
    fn depth(&self) -> u64 {
        127 - self.leading_zeros() as u64
    }

    fn index_at_depth(&self) -> u128 {
        self - (1 << self.depth())
    }

    fn left(&self) -> Self {
        self << 1
    }

    fn right(&self) -> Self {
        self.left() | 1
    }

    fn parent(&self) -> Self {
        self >> 1
    }

    fn right_index(&self, max_depth: u64) -> Self {
        let remaining = max_depth - self.depth();
        (self << remaining) | ((1 << remaining) - 1)
    }

    fn trace_index(&self, max_depth: u64) -> u128 {
        self.right_index(max_depth).index_at_depth()
    }

    fn make_move(&self, is_attack: bool) -> Self {
        ((!is_attack as u128) | self) << 1
    }

    fn move_right(&self) -> Option<Self> {
        let next = self + 1;
        (next.depth() == self.depth()).then_some(next)
    }

    fn right_of(&self, parent: Self) -> bool {
        self.index_at_depth() != parent.index_at_depth() * 2
    }

    fn relative_to_ancestor_at_depth(&self, ancestor_depth: u64) -> Option<Self> {
        let depth = self.depth();
        if ancestor_depth > depth {
            return None;
        }
        let relative_depth = depth - ancestor_depth;
        let index = self.index_at_depth() % (1 << relative_depth);
        Some(compute_gindex(relative_depth, index))
    }
}

//! The capability surface a message-bus library provides for appending.

use crate::options::MAX_DEPTH;
use crate::types::{BasicValue, ContainerKind};

/// An outgoing message that arguments can be appended to.
///
/// This is the boundary to the message-bus library: an
/// [`ArgumentCursor`](crate::ArgumentCursor) only ever talks to a message
/// through these calls. Positions and partial encodings live behind
/// `Iter`; the cursor never inspects them.
///
/// Every method reports failure the way the underlying library does, with a
/// missing handle or `false`. Interpreting failures is left to the cursor.
pub trait AppendTarget {
    /// The library's append iterator.
    type Iter;

    /// `false` if the message is sealed, invalid, or already has a writer.
    fn is_writable(&self) -> bool;

    /// Deepest array or struct nesting the message accepts.
    fn max_depth(&self) -> usize {
        MAX_DEPTH
    }

    /// Starts appending at the end of the argument list.
    ///
    /// `None` means the iterator could not be allocated.
    fn iter_init_append(&mut self) -> Option<Self::Iter>;

    /// Writes one tagged basic value at `iter` and advances it.
    fn iter_append_basic(&mut self, iter: &mut Self::Iter, value: BasicValue<'_>) -> bool;

    /// Opens a container at `iter` and returns the iterator for its contents.
    ///
    /// `contained` is the element signature for arrays and the contained
    /// signature for variants; structs and dict entries pass `None`.
    fn iter_open_container(
        &mut self,
        iter: &mut Self::Iter,
        kind: ContainerKind,
        contained: Option<&str>,
    ) -> Option<Self::Iter>;

    fn iter_close_container(&mut self, iter: &mut Self::Iter, sub: Self::Iter) -> bool;

    /// Discards a container opened under `iter` and everything written into it.
    fn iter_abandon_container(&mut self, iter: &mut Self::Iter, sub: Self::Iter);

    /// Frees an iterator obtained from [`AppendTarget::iter_init_append`].
    fn iter_release(&mut self, iter: Self::Iter);

    /// Ends the argument list.
    fn append_terminator(&mut self) -> bool;
}

//! Caret capture/restore across structural moves.
//!
//! Offsets are UTF-16 code units, matching `selectionStart` on the DOM text surface.

use crate::models::NodeId;
use crate::util::{byte_idx_to_utf16, utf16_to_byte_idx};

/// Where the caret currently is, as seen by whatever owns the text surfaces.
pub trait CaretSource {
    /// Caret offset inside `id`'s text surface, or `None` when the active selection's
    /// anchor lies elsewhere.
    fn anchor_offset(&self, id: &NodeId) -> Option<u32>;
}

/// No text surface has the caret (headless callers).
pub struct NoCaret;

impl CaretSource for NoCaret {
    fn anchor_offset(&self, _id: &NodeId) -> Option<u32> {
        None
    }
}

/// Caret pinned inside one node.
pub struct CaretAt {
    pub id: NodeId,
    pub offset: u32,
}

impl CaretAt {
    pub fn new(id: impl Into<NodeId>, offset: u32) -> Self {
        Self {
            id: id.into(),
            offset,
        }
    }
}

impl CaretSource for CaretAt {
    fn anchor_offset(&self, id: &NodeId) -> Option<u32> {
        (&self.id == id).then_some(self.offset)
    }
}

/// Focus request: put the caret of `id`'s text surface at `offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaretPosition {
    pub id: NodeId,
    pub offset: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorTracker {
    id: NodeId,
    offset: u32,
}

impl CursorTracker {
    /// Read the caret for `id`; defaults to 0 when the selection is not inside it.
    pub fn capture(source: &impl CaretSource, id: &NodeId) -> Self {
        Self {
            id: id.clone(),
            offset: source.anchor_offset(id).unwrap_or(0),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Focus request for the tracked node with the offset clamped to `text`.
    pub fn restore(&self, text: &str) -> CaretPosition {
        CaretPosition {
            id: self.id.clone(),
            offset: clamp_caret(text, self.offset),
        }
    }
}

/// Clamp to the text length and snap out of surrogate pairs.
pub fn clamp_caret(text: &str, offset: u32) -> u32 {
    byte_idx_to_utf16(text, utf16_to_byte_idx(text, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_reads_offset_only_inside_node() {
        let source = CaretAt::new("a", 4);
        let a = CursorTracker::capture(&source, &NodeId::from("a"));
        let b = CursorTracker::capture(&source, &NodeId::from("b"));
        assert_eq!(a.offset(), 4);
        assert_eq!(b.offset(), 0);
        assert_eq!(CursorTracker::capture(&NoCaret, &NodeId::from("a")).offset(), 0);
    }

    #[test]
    fn test_restore_clamps_to_text_length() {
        let t = CursorTracker::capture(&CaretAt::new("a", 10), &NodeId::from("a"));
        assert_eq!(
            t.restore("abc"),
            CaretPosition {
                id: NodeId::from("a"),
                offset: 3
            }
        );
        assert_eq!(t.restore("").offset, 0);
        assert_eq!(t.restore("0123456789abc").offset, 10);
    }

    #[test]
    fn test_clamp_caret_never_splits_surrogate_pair() {
        assert_eq!(clamp_caret("a😀", 2), 1);
        assert_eq!(clamp_caret("a😀", 3), 3);
    }
}

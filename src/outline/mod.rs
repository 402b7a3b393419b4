//! The outline mutation engine.
//!
//! [`OutlineTree`] is the structural state, [`Outliner`] runs commands against it and a
//! [`crate::store::NodeStore`], and the editor applies the queued [`OutlineChange`]s.

mod command;
mod engine;
mod tree;

pub use command::{Command, KeyChord, LogicalKey, Modifiers};
pub use engine::{CommandError, CommandOutcome, FlushReport, Outliner};
pub use tree::{OutlineNode, OutlineTree};

use crate::cursor::CaretPosition;
use crate::models::NodeId;

/// What a mutation did, for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutlineChange {
    /// A new node entered `parent`'s container.
    Inserted { id: NodeId, parent: NodeId },
    /// The node and its view are gone.
    Removed { id: NodeId },
    /// Container order changed.
    ChildrenChanged { id: NodeId },
    TextChanged { id: NodeId },
    CheckedChanged { id: NodeId },
    /// `expanded` or `has-subtasks` changed.
    FlagsChanged { id: NodeId },
    Frozen { id: NodeId },
    Focus(CaretPosition),
}

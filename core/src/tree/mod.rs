//! Lazy tree synchronized with the remote hierarchy.

mod controller;
mod deleted;
mod memory;
mod node;
mod widget;


pub use controller::{LoadTicket, Outcome, TreeController, TreeError};
pub use deleted::{detail, DeletedAssetsView, DeletedDetail};
pub use memory::MemoryTree;
pub use node::{node_spec, LoadState, NodeData, NodeKey, NodeSpec, UiNode};
pub use widget::{Confirm, FixedAnswer, MoveEvent, TreeEvent, TreeWidget};

//! Command implementations for the `grit-sv` binary.

pub mod build;
pub mod demo_align;
pub mod shard;

pub use build::BuildCommand;
pub use demo_align::{read_demo_alignments, DemoAlignmentRecord};
pub use shard::ShardCommand;

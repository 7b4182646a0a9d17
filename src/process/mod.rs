//! Process data model: PCB pool, process tree, support structures.

pub mod pcb;
pub mod state;

pub use pcb::{PcbPool, SupportPool};
pub use state::{ExceptionContext, ExceptionKind, PageTableEntry, SupportStruct};

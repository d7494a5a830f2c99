mod arrayvec;
mod thread;

pub use arrayvec::ArrayVec;
pub use thread::{ThreadPriority, thread_boot};

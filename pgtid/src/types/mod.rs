//! Value types describing locations in server logs and the records found there.

mod event;
mod position;

pub use event::*;
pub use position::*;

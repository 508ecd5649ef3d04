pub mod command;
pub mod record;

pub use command::{DEFAULT_PUSH_COMMAND, END, READY, STORED};
pub use record::{HEADER_LEN, STREAM_TERMINATOR, VnodeRecord, zero_clock};

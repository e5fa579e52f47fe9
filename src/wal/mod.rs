//! Write-ahead log: framed record codec, segment writer, and replay.
//!
//! A WAL segment is a plain concatenation of frames with no file header.
//! Each frame carries a length, a CRC32 over its payload, and a typed
//! payload describing one transactional operation. Appends are made durable
//! with an explicit sync; recovery replays frames sequentially and stops at
//! the first damage it finds.

mod record;
mod recovery;
mod writer;

pub use record::{RecordType, WalRecord, FRAME_HEADER_LEN};
pub use recovery::recover;
pub use writer::WalWriter;

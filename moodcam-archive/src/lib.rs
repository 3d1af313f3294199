//! moodcam-archive: remote persistence of detection events
//!
//! Frames go to a blob bucket, records to an append-only log table, and the
//! same table answers the newest-first log query served over HTTP.

pub mod archive;
pub mod error;
pub mod memory;
pub mod supabase;

pub use archive::{clamp_limit, newest_first, Archive, MAX_LOG_RECORDS};
pub use error::ArchiveError;
pub use memory::MemoryArchive;
pub use supabase::SupabaseArchive;

//! Background job execution.
//!
//! - [`handlers`]: one handler per job kind, dispatched by exhaustive match
//! - [`worker`]: claims jobs one at a time and records how they ended
//! - [`recovery`]: the configured policy for jobs abandoned in `processing`

pub mod handlers;
pub mod recovery;
pub mod worker;

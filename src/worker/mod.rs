//! Worker thread that owns the blocking engine session.
//!
//! Every engine call funnels through one std `mpsc` channel to a dedicated
//! thread; replies come back over tokio oneshots. The async side never
//! touches the session directly, which is what lets the public API stay
//! `Send` while the engine itself is not.

mod channel;
mod dispatcher;
mod manager;

pub(crate) use channel::ExecuteOutcome;
pub(crate) use manager::WorkerHandle;

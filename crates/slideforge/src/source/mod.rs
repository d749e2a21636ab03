//! Source lifecycle: the durable record of each upload, the store that owns
//! it, and the approval gate that is the sole writer of its status.

pub mod gate;
pub mod status;
pub mod store;

pub use gate::ApprovalGate;
pub use status::SourceStatus;
pub use store::{NewSource, Source, SourceStore};

// Managers Module
//
// Adapters between the pipeline's observer interfaces and host-side
// infrastructure.
//
// - BroadcastObservers: fans every observer callback out on a tokio broadcast
//   channel for async consumers

pub mod broadcast_manager;

pub use broadcast_manager::{BroadcastObservers, PipelineEvent};

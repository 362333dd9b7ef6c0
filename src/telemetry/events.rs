//! Telemetry event types describing pipeline health, exposed to the CLI and
//! to broadcast subscribers.

use serde::{Deserialize, Serialize};

use crate::detector::BlockEvent;

/// Why a sample never reached a fused window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Timestamp not after the previous sample of the same source
    Reorder,
    /// Timestamp before the current window cursor
    Late,
    /// Source unknown and auto-registration disabled
    Unregistered,
}

/// Metric events covering decode quality, fusion health, block lifecycle and
/// worker backpressure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    QueueOccupancy {
        channel: String,
        percent: f32,
    },
    DecodePartial {
        source: String,
        code: i32,
        decoded: usize,
    },
    SampleDropped {
        source: String,
        reason: DropReason,
    },
    FusionGap {
        window_start_ms: u64,
        sources: Vec<String>,
    },
    BlockTransition {
        event: BlockEvent,
        window_start_ms: u64,
    },
    Classification {
        label: Option<String>,
        confidence: f32,
        windows: usize,
    },
    Error {
        code: i32,
        context: String,
    },
}

//! Overlay client side: diff/animation state machine and HTTP pollers

mod poller;
mod sync;

pub use poller::{CaptureStatusPoller, OverlayMode, OverlayPoller};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dcp-client: The DCP stream consumer.
//!
//! Wires the transport seam, partition workers, the stream supervisor, and
//! the feed emitter into the downstream `Feed` handle. Data flows
//! *transport → observer → worker → feed*; control flows *supervisor →
//! transport* with stream-end notices coming back over the worker channel.

mod error;
mod feed;
mod observer;
mod shared;
mod supervisor;
mod worker;

pub use error::{FeedError, WorkerError};
pub use feed::Feed;

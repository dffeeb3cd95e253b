// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dcp-transport: The seam between the consumer core and the wire protocol.
//!
//! The binary streaming protocol itself lives in an external library; this
//! crate defines what the core needs from it: a way to open and close
//! per-partition streams, and the observer contract its callbacks land on.

mod observer;
mod stream;

#[cfg(any(test, feature = "test-support"))]
mod scripted;

pub use observer::StreamObserver;
pub use stream::{OpenOutcome, OpenParams, StreamTransport, TransportError};

#[cfg(any(test, feature = "test-support"))]
pub use scripted::ScriptedTransport;

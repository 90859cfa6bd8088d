// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ksi-wire: newline-delimited JSON framing over the Unix socket transport
//!, plus the client request and server message wire shapes.

pub mod frame;
pub mod request;
pub mod response;

pub use frame::{read_frame, write_frame, FrameError, LineCodec, DEFAULT_MAX_FRAME_BYTES};
pub use request::ClientRequest;
pub use response::ServerMessage;

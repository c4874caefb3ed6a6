//! Shared vocabulary between the Paddock relay and its consumers
//!
//! Holds the inbound turn contract, the outbound line protocol (both
//! families), and the error trait the HTTP layer relies on.

#![allow(clippy::must_use_candidate)]

mod error;
pub mod request;
pub mod wire;

pub use error::HttpError;
pub use request::{ChatTurnRequest, ImageTurnRequest, SESSION_ID_HEADER};
pub use wire::{ContentType, MediaResult, OutboundEvent, WireLine, decode_line};

//! Inbound adapters translating external requests into domain calls while
//! keeping framework details at the edge.
//!
//! REST handlers live under [`http`]; the real-time relay lives under [`ws`].

pub mod http;
pub mod ws;

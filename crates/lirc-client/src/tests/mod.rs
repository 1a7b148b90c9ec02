//! Session-level tests for lirc-client
//!
//! These drive a [`crate::Session`] through a scripted daemon channel:
//! - Connection state machine (connect, close, reconnect, failures)
//! - Event dispatch order and translation fan-out
//! - Mode access through the first table
//! - Registry management independent of the connection

mod session_tests;

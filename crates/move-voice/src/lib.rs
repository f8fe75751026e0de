//! Move Voice: speaks game events by chaining short pre-recorded clips.
//!
//! Each event is a list of clip ids (`piece/knight square/f3`) resolved to files under a
//! clips directory. Events go through a priority play queue so that at most one is
//! audible, stronger events cut off weaker queued ones, and backlog collapses to the
//! most recent event.
//!
//! ## Modes
//! - `say`: play one event and exit.
//! - `listen`: read events and control lines from stdin.

pub mod cli;
pub mod config;
pub mod events;
pub mod runtime;

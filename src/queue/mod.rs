//! Queue-side dispatch of gamepad input.
//!
//! Bridges the input subsystem to the host queue: button edges arrive on
//! an mpsc channel, get resolved to actions through the mapping store, and
//! turn into queue calls (reveal, rate, navigate, scroll). Press edges
//! drive feedback only; the actual queue mutation always happens on
//! release, so a mis-press can be walked back by sliding off the button.

pub mod dispatcher;

pub use dispatcher::QueueDispatcher;

//! WebAssembly bindings for the console core.
//!
//! The browser has no spare thread to give the execution actor, so the
//! binding drives the synchronous [`Scheduler`](crate::Scheduler) from the
//! page's `requestAnimationFrame` callback instead.

#[cfg(feature = "wasm")]
pub mod api;

#[cfg(feature = "wasm")]
pub use api::WasmConsole;

//! Bounded diagnostic log for Turnstile.
//!
//! Every component of the server reports through a single
//! [`DiagnosticLog`]: a severity-filtered ring buffer of [`LogMessage`]s
//! that also renders each accepted line to a [`LogSink`] (the console by
//! default).
//!
//! 1. **Filtering**: messages below the configured [`Level`] are dropped
//!    before they are formatted.
//! 2. **Retention**: the buffer holds at most `capacity` messages; the
//!    oldest are evicted first.
//! 3. **Shutdown hooks**: callbacks that run before a fatal exit.
//!
//! # How it fits in the stack
//!
//! ```text
//! tracing::info!(..) at every call site
//!     ↓
//! DiagnosticLayer (this crate)  ← tracing-subscriber layer
//!     ↓
//! DiagnosticLog (this crate)    ← ring buffer + sink
//! ```

mod error;
mod layer;
mod level;
mod log;
mod message;
mod sink;

pub use error::LogError;
pub use layer::DiagnosticLayer;
pub use level::Level;
pub use log::{DiagnosticLog, LogConfig};
pub use message::{LogMessage, render_line};
pub use sink::{ConsoleSink, LogSink, NullSink};

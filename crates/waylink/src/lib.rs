//! # Waylink
//!
//! Schema-driven client for the Wayland wire protocol.
//!
//! Waylink talks to a compositor without generated bindings: interfaces are
//! loaded as data (the core protocol is bundled, extensions can be loaded
//! from JSON), and every object is a [`Proxy`] whose requests and events are
//! looked up by name at runtime.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waylink::prelude::*;
//!
//! # async fn run() -> Result<(), WaylinkError> {
//! let display = Display::connect().await?;
//! for global in display.globals() {
//!     println!("{} v{}", global.interface, global.version);
//! }
//!
//! let output = display.bind("wl_output", None).await?;
//! let state = output.drain().await?;
//! println!("{:?}", state.value("name"));
//! # Ok(())
//! # }
//! ```

mod aggregate;
mod config;
mod display;
mod error;
mod events;
mod proxy;
mod pump;
mod registry;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use aggregate::{Aggregation, Entry, Field, Snapshot};
pub use config::{DisplayConfig, MAX_CLIENT_ID};
pub use display::{Display, DisplayBuilder, Global, Notice, REGISTRY_ID};
pub use error::WaylinkError;
pub use events::{Event, EventArg, EventStream, ListenerId, OnceEvent};
pub use proxy::Proxy;
pub use registry::ObjectRegistry;

pub use waylink_protocol::{
    Arg, ArgType, ArgumentDefinition, EnumEntry, Interface, InterfaceDefinition,
    MessageDefinition, ObjectId, ProtocolError, Schema,
};
pub use waylink_transport::{StreamConnection, TransportError};

/// Locks a std mutex, recovering the data if a listener panicked while
/// holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Common imports for waylink users.
pub mod prelude {
    pub use crate::{
        Arg, Display, DisplayBuilder, DisplayConfig, Event, Global, Notice, ObjectId, Proxy,
        Schema, Snapshot, WaylinkError,
    };
}

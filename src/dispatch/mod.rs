//! Callback registries.
//!
//! - [`PortRouter`] demultiplexes inbound packets by port to subsystem handlers.
//! - [`EventSource`] is a typed event with add/remove-able callbacks, used for
//!   link lifecycle events and streamed log data.
//!
//! Both keep their handlers behind a mutex and invoke them on the calling
//! thread after releasing it, so a handler may register or unregister
//! handlers without deadlocking. A panicking handler is logged and does not
//! stop the remaining handlers from running.

mod event;
mod router;

pub use event::{Callback, EventSource};
pub use router::{PacketHandler, PortRouter};

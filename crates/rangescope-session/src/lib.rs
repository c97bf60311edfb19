//! Rangescope session
//!
//! The drill-down core: a four-slot selection with cascade invalidation, a
//! pure resolver from (catalog, selection) to a date range, and the session
//! context that ties both to a catalog store behind a single event queue.
//!
//! ```text
//!   feed ──Snapshot──┐
//!                    ├──► mpsc ──► run_session ──► Session::apply ──► render(SessionView)
//!   user ──Select────┘
//! ```

pub mod event_loop;
pub mod resolver;
pub mod selection;
pub mod session;

pub use event_loop::{
    channel, run_session, Applied, SessionClosed, SessionEvent, SessionHandle,
    DEFAULT_QUEUE_CAPACITY,
};
pub use resolver::{
    available_categories, available_frequencies, available_instruments, available_timeframes,
    leaf_of, resolve, Resolved, Timeframes,
};
pub use selection::{Selection, Slot, UnknownSlot};
pub use session::{Session, SessionView};

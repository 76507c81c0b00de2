//! Connection-engine building blocks for tidewire.
//!
//! This crate holds the leaf components the session state machine composes:
//!
//! - **[`ServerPool`]**: weighted random selection of a cluster member, for both
//!   the initial connect and failover reconnects
//! - **[`ReconnectScheduler`]**: the two-phase (quick, then policy driven) backoff
//! - **[`ReconnectRateGuard`]**: reconnect attempts counted per 3-minute window
//! - **[`ConnectionState`]**: the connection lifecycle states
//!
//! # Examples
//!
//! ```rust
//! use tidewire_reconnect::{ReconnectConfig, ReconnectPolicy, ReconnectScheduler};
//! use rand::{rngs::StdRng, SeedableRng};
//! use std::time::Duration;
//!
//! let config = ReconnectConfig::builder()
//!     .quick_reconnect_initial_delay(Duration::from_secs(2))
//!     .policy(ReconnectPolicy::ConstantWindowBackoff)
//!     .build();
//!
//! let mut scheduler = ReconnectScheduler::new(config);
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! // First quick retry lands within [0s, 2s).
//! let delay = scheduler.next_delay(false, &mut rng);
//! assert!(delay < Duration::from_secs(2));
//! ```

mod config;
mod events;
mod guard;
mod policy;
mod pool;
mod scheduler;
mod state;

pub use config::{
    ReconnectConfig, ReconnectConfigBuilder, ATYPICAL_DELAY_FLOOR, RECONNECT_RATE_WINDOW,
};
pub use events::{EventListener, EventListeners, ReconnectEvent};
pub use guard::ReconnectRateGuard;
pub use policy::ReconnectPolicy;
pub use pool::{ServerEntry, ServerPool, DEFAULT_WEIGHT, MAX_WEIGHT};
pub use scheduler::{ReconnectContext, ReconnectPhase, ReconnectScheduler};
pub use state::{ConnectionState, SharedConnectionState};

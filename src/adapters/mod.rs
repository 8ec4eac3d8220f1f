//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter | Implements | Backed by                      |
//! |---------|------------|--------------------------------|
//! | `clock` | Clock      | `Instant` / manual test clock  |

pub mod clock;

//! Exclusive, time-bounded leases on device endpoints and identities.
//!
//! A booking locks two keys at once, the endpoint URL and the device id, so a
//! device cannot be double-booked through a second endpoint alias and one busy
//! endpoint does not hand out its other devices. Grants are proven by
//! stateless lock tokens; the store only knows resource keys.

mod manager;
mod store;

pub use self::manager::{Lease, LeaseManager};
pub use self::store::{LeaseKey, LeaseRecord, LeaseStore};

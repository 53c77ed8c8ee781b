//! DNS MX resolution.
//!
//! [`check_mx`] performs a synchronous lookup using the system resolver and
//! returns a [`MxStatus`] describing the outcome. The probe itself goes
//! through [`resolve_with`] so any [`LookupMx`] implementation can stand in
//! for DNS.

mod resolver;
mod types;

pub use resolver::{LookupMx, check_mx, normalize_exchange, resolve_with, system_resolver};
pub use types::{MxRecord, MxStatus};

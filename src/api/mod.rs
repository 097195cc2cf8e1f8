//! HTTP surface (§6 "CLI / HTTP surface"): a thin REST adapter over the
//! versioning core. This is explicitly out of scope for the core protocol
//! (§1) — it decodes parameters, calls into the stores/builders, and shapes
//! responses; it does not implement any versioning semantics itself.
//! Authorization is out of scope here too (§6 "the core trusts its caller").

mod dto;
mod routes;

pub use routes::{router, AppState};

//! HTTP request processing
//!
//! The per-method handlers translate HTTP into persistence operations
//! through the service contracts. Each handler composes the same steps:
//! resolve the target, evaluate preconditions, read the entity, check
//! constraints, persist, append audit quads, and emit notifications.

pub mod conditions;
pub mod conneg;
mod core;
mod delete;
pub mod etag;
mod get;
pub mod link;
pub mod memento;
mod options;
mod patch;
mod post;
pub mod prefer;
mod put;
pub mod request;
mod server;

pub use conditions::Conditions;
pub use conneg::{negotiate, parse_accept, MediaRange};
pub use etag::EntityTag;
pub use link::Link;
pub use prefer::{selected_graphs, Prefer, ReturnPreference};
pub use request::{Extension, LdpRequest};
pub use server::{app, LdpServer};

//! Single dependency for skylink consumers.
//!
//! Re-exports the wire types and the client-side state engine, so code that
//! embeds the mirror (a renderer, a replay tool) only names `skylink`.

pub use skylink_engine as engine;
pub use skylink_protocol as protocol;

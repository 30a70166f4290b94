//! Live Chrome bridge: launch, navigate, and capture pages into [`crate::dom::DomTree`].

pub mod capture;
pub mod launcher;
pub mod session;

pub use session::BrowserSession;

//! Page content extraction
//!
//! In-page scripts gather raw element facts; the Rust side turns them into
//! [`ExtractedElement`](crate::model::ExtractedElement)s.

pub mod heuristic;
pub mod js_scripts;
pub mod replay;
pub mod snapshot;

pub use heuristic::extract_auto;
pub use replay::{merge, replay};
pub use snapshot::{ElementKind, ElementSnapshot};

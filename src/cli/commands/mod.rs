//! Command execution functions for the release manager.

mod check;
mod preprocess;
mod release;

pub use check::run_check;
pub use preprocess::{preprocess_inbox, run_preprocess};
pub use release::{ReleaseOptions, run_release};

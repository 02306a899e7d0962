pub mod arch;
pub mod data;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod scheduling;

pub use error::{MlErr, Result};

mod accuracy;
mod average_meter;
pub mod checkpoint;
mod early_stopping;
mod history;
mod metrics;

pub use accuracy::accuracy;
pub use average_meter::AverageMeter;
pub use early_stopping::{EarlyStopper, EarlyStopping};
pub use history::{EpochRecord, History};
pub use metrics::Metrics;

mod batch;
mod csv;
mod dataloader;
mod dataset;
mod synthetic;

pub use batch::{Batch, BatchSource};
pub use csv::load_csv;
pub use dataloader::DataLoader;
pub use dataset::InMemoryDataset;
pub use synthetic::synthetic_patterns;

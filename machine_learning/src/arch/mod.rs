pub mod activations;
mod builder;
pub mod layers;
pub mod loss;
mod model;
mod sequential;
mod spec;
pub mod zoo;

pub use builder::ModelBuilder;
pub use model::{Mode, Model};
pub use sequential::Sequential;
pub use spec::{ActFnSpec, LayerSpec};

mod conv2d;
mod dense;
mod dropout;
mod flatten;
mod layer;
mod max_pool2d;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use layer::Layer;
pub use max_pool2d::MaxPool2d;

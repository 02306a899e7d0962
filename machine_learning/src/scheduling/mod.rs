mod cosine_annealing_lr;
mod exponential_lr;
mod scheduler;
mod step_lr;

pub use cosine_annealing_lr::CosineAnnealingLr;
pub use exponential_lr::ExponentialLr;
pub use scheduler::LrScheduler;
pub use step_lr::StepLr;

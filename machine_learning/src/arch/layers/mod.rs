mod dense;
mod layer;
mod lstm;

pub use dense::Dense;
pub use layer::Layer;
pub use lstm::Lstm;

pub mod directions;
pub mod payments;

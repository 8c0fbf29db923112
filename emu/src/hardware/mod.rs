pub mod divisor;
pub mod touchscreen;

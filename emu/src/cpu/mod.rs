#[allow(clippy::module_name_repetitions)]
pub mod arm;
pub mod coprocessor;
pub mod cpu_modes;
pub mod exception;
pub mod lines;
pub mod psr;

#[allow(clippy::cast_possible_truncation)]
pub mod registers;

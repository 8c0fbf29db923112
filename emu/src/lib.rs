#[allow(clippy::cast_possible_truncation)]
pub mod bitwise;

#[allow(clippy::cast_possible_truncation)]
pub mod bus;
pub mod cpu;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_sign_loss)]
pub mod hardware;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::module_name_repetitions)]
pub mod hwio;

#[allow(clippy::cast_possible_truncation)]
pub mod memory;

#![doc = include_str!("../README.md")]
#![deny(unsafe_op_in_unsafe_fn)]

#[macro_use]
mod macros;

mod core;
pub mod hl;
pub mod raw;
pub mod trace;
mod utils {
    pub mod panicking;
}

//! Library wrapper around the `impact` CLI implementation.
//!
//! Compiling the binary crate root (`main.rs`) as a module lets
//! `cargo test -p impact-cli --lib` typecheck the CLI without building the
//! integration test binaries.
//!
//! `fn main()` inside `main.rs` is just another function when compiled as a
//! module.

#[allow(dead_code)]
#[path = "main.rs"]
mod main_bin;

//! Build Script for Chain Stream
//!
//! Emits the coverage cfg and rebuild triggers for the checked-in
//! protobuf stubs under `packages/schema-gen/rust/chainstream/`.
//!
//! The stubs are generated from `packages/proto/chainstream/v1/stream.proto`
//! with `buf generate` and committed, so building does not need `buf` or
//! `protoc` in PATH.

use std::env;

fn main() {
    // Rerun build script if it changes
    println!("cargo:rerun-if-changed=build.rs");

    // Rerun if the checked-in stubs change
    println!("cargo:rerun-if-changed=../../packages/schema-gen/rust/chainstream/");

    // Emit cfg for coverage detection
    // Usage: #[cfg(coverage)] or #[cfg(not(coverage))]
    if env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS")
            .map(|f| f.contains("instrument-coverage"))
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=coverage");
    }
}

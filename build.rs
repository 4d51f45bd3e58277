//! Build script for codec-session
//!
//! Only the Node.js binding needs build-time setup; the core library is
//! pure Rust and links nothing native.

fn main() {
  #[cfg(feature = "node")]
  napi_build::setup();

  println!("cargo:rerun-if-changed=build.rs");
}

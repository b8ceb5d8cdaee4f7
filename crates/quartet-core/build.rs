/// Builds the gRPC client and server code for the `quartet.proto` definition
/// using `tonic-prost-build`.
///
/// The three services (`EntityService`, `ComputeService`, `GreetService`)
/// live in a single `quartet` package so that one file descriptor set can be
/// registered with the reflection service.
///
/// # Files and Paths
///
/// - Proto file: `proto/quartet.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/quartet_descriptor.bin`
///
/// # Panics
///
/// This function will `panic!` if code generation fails.
///
/// # Output
///
/// Generated code is exposed in Rust via:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("quartet");
/// }
/// ```
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("quartet_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/quartet.proto");

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/quartet.proto"], &["proto"])
        .unwrap();
}

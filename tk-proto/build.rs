//! Compiles the rule-sync and event-ingestion protocol definitions into
//! Rust types using tonic-build.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_well_known_types(true)
        .compile_protos(&["proto/trapperkeeper.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/trapperkeeper.proto");

    Ok(())
}

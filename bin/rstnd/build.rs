//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "binary"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Binary entrypoint for the station daemon."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_cargo().emit()?;
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}

//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "build"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Build script emitting version metadata."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    EmitBuilder::builder().all_build().all_cargo().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RSTN_GIT_SHA");
    Ok(())
}

//! Synthesizes record types and statements into `OUT_DIR` for the library
//! to compile.

use std::path::Path;

use tuplegen::codegen::SourceSynthesizer;

#[allow(dead_code)]
#[path = "src/specs.rs"]
mod specs;

fn write(out_dir: &Path, file: &str, source: &str) -> tuplegen::Result<()> {
    std::fs::write(out_dir.join(file), source)?;
    Ok(())
}

fn main() -> tuplegen::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/specs.rs");

    let out_dir = std::env::var("OUT_DIR")
        .map_err(|e| tuplegen::TupleGenError::Config(format!("OUT_DIR: {}", e)))?;
    let out_dir = Path::new(&out_dir);
    let synth = SourceSynthesizer::new();

    let v1 = specs::conv_v1()?.build()?;
    write(out_dir, "conv_v1.rs", &synth.synthesize(&v1)?.source_text)?;
    let v2 = specs::conv_v2(&v1.spec)?.build()?;
    write(out_dir, "conv_v2.rs", &synth.synthesize(&v2)?.source_text)?;

    let item_row = specs::item_row()?.build()?;
    write(out_dir, "item_row.rs", &synth.synthesize(&item_row)?.source_text)?;
    write(
        out_dir,
        "items.rs",
        &synth.synthesize_statement(&specs::items()?)?.source_text,
    )?;
    write(
        out_dir,
        "restock.rs",
        &synth.synthesize_statement(&specs::restock()?)?.source_text,
    )?;
    Ok(())
}

//! Generates the tree libraries into `OUT_DIR`.
//!
//! `calc` comes from the grammar next to this crate; `ast` and `asr` are the
//! schemas shipped inside `asdl_gen`, so a change there rebuilds the
//! generator and reruns this script.

use std::error::Error;
use std::path::{Path, PathBuf};

use asdl_gen::{generate_file, generate_known, write_if_changed, Conventions, KnownSchema};

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    println!("cargo:rerun-if-changed=grammar/calc.asdl");
    generate_file(
        Path::new("grammar/calc.asdl"),
        &out_dir.join("calc.rs"),
        &Conventions::default(),
    )?;

    for schema in KnownSchema::ALL {
        let source = generate_known(schema)?;
        write_if_changed(&out_dir.join(format!("{}.rs", schema.name())), &source)?;
    }
    Ok(())
}

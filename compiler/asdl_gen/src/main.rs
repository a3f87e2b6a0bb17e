//! ASDL Schema Compiler CLI
//!
//! Generates a Rust tree library from an ASDL schema.

use std::path::Path;

use asdl_gen::{generate_file, generate_known, write_if_changed, Conventions, GenError, KnownSchema};

fn main() {
    asdl_gen::init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "help" | "--help" | "-h" => print_usage(),
        name if KnownSchema::from_name(name).is_some() => {
            let (Some(schema), Some(out)) = (KnownSchema::from_name(name), args.get(2)) else {
                eprintln!("Usage: asdlc {name} <out.rs>");
                std::process::exit(1);
            };
            let result = generate_known(schema)
                .and_then(|source| write_if_changed(Path::new(out), &source));
            exit_on_error(result);
        }
        _ => {
            if args.len() < 3 {
                eprintln!("error: missing output path");
                eprintln!("Usage: asdlc <schema.asdl> <out.rs> [--conventions=<file.toml>]");
                std::process::exit(1);
            }

            let mut conventions = Conventions::default();
            for arg in args.iter().skip(3) {
                if let Some(path) = arg.strip_prefix("--conventions=") {
                    conventions = match Conventions::load(Path::new(path)) {
                        Ok(c) => c,
                        Err(e) => {
                            eprintln!("error: {e}");
                            std::process::exit(1);
                        }
                    };
                } else {
                    eprintln!("error: unknown option '{arg}'");
                    std::process::exit(1);
                }
            }

            exit_on_error(generate_file(Path::new(command), Path::new(&args[2]), &conventions));
        }
    }
}

fn exit_on_error(result: Result<(), GenError>) {
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("asdlc: generate a Rust tree library from an ASDL schema");
    println!();
    println!("Usage:");
    println!("  asdlc <schema.asdl> <out.rs> [options]   Generate from a schema file");
    println!("  asdlc ast <out.rs>                       Generate the shipped AST library");
    println!("  asdlc asr <out.rs>                       Generate the shipped ASR library");
    println!("  asdlc help                               Show this message");
    println!();
    println!("Options:");
    println!("  --conventions=<file.toml>   Schema roles (expression union, gates, ...)");
    println!();
    println!("Set RUST_LOG=asdl_gen=debug to trace the passes.");
}

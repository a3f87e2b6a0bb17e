//! Library for the `AST` schema: one Fortran source file as parsed.

#![allow(unused, clippy::all, clippy::pedantic)]

include!(concat!(env!("OUT_DIR"), "/ast.rs"));

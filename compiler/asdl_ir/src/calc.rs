//! Library for the `Calc` schema (`grammar/calc.asdl`).

#![allow(unused, clippy::all, clippy::pedantic)]

include!(concat!(env!("OUT_DIR"), "/calc.rs"));

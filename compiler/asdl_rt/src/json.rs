//! JSON building blocks for the generated dumper.
//!
//! Node shape: `{"node": Name, "fields": {...}, "loc": {...}}`. Records use
//! the same shape with their type name. Symbol tables render as
//! `{"node": "SymbolTable", "counter": n, "symbols": {...}}`.

pub use serde_json::{Map, Value};

use crate::location::LocationResolver;
use crate::span::Span;

pub fn node(name: &str, fields: Map<String, Value>, loc: Value) -> Value {
    let mut object = Map::new();
    object.insert("node".to_string(), Value::from(name));
    object.insert("fields".to_string(), Value::Object(fields));
    object.insert("loc".to_string(), loc);
    Value::Object(object)
}

/// Span endpoints, plus file/line/column for each when a resolver is given.
pub fn loc(span: Span, resolver: Option<&dyn LocationResolver>) -> Value {
    let mut object = Map::new();
    object.insert("first".to_string(), Value::from(span.start));
    object.insert("last".to_string(), Value::from(span.end));
    if let Some(resolver) = resolver {
        for (prefix, offset) in [("first", span.start), ("last", span.end)] {
            if let Some(location) = resolver.resolve(offset) {
                object.insert(format!("{prefix}_filename"), Value::from(location.filename));
                object.insert(format!("{prefix}_line"), Value::from(location.line));
                object.insert(format!("{prefix}_column"), Value::from(location.column));
            }
        }
    }
    Value::Object(object)
}

pub fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

pub fn symbol_ref(counter: u64, name: &str) -> Value {
    Value::from(format!("{name} (SymbolTable{counter})"))
}

pub fn scope_ref(counter: u64) -> Value {
    Value::from(format!("SymbolTable{counter}"))
}

pub fn scope(counter: u64, symbols: Map<String, Value>) -> Value {
    let mut object = Map::new();
    object.insert("node".to_string(), Value::from("SymbolTable"));
    object.insert("counter".to_string(), Value::from(counter));
    object.insert("symbols".to_string(), Value::Object(symbols));
    Value::Object(object)
}

/// Render, pretty-printed or compact.
pub fn render(value: &Value, pretty: bool) -> String {
    if pretty {
        format!("{value:#}")
    } else {
        value.to_string()
    }
}

//! Text writers behind the generated pickler and tree printer.
//!
//! Generated code decides *what* to print; these writers own spacing,
//! indentation, connectors and color. Presentation options never change the
//! token sequence: stripping ANSI escapes and collapsing whitespace turns
//! any rendering into the plain single-line one.

const VARIANT_COLOR: &str = "\x1b[1;35m";
const ENUM_COLOR: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";
const INDENT: &str = "    ";

/// Presentation options for the parenthesized form.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PickleOptions {
    pub use_colors: bool,
    pub indent: bool,
}

impl PickleOptions {
    pub const PLAIN: PickleOptions = PickleOptions {
        use_colors: false,
        indent: false,
    };
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Pending {
    /// Nothing to separate from (just after `(`, `[`, `{`).
    None,
    /// After a token.
    Token,
    /// After a `name:` key inside a symbol table.
    Key,
}

/// Writer for the `(Name field ...)` form.
pub struct PickleWriter {
    out: String,
    options: PickleOptions,
    depth: usize,
    inline: usize,
    pending: Pending,
}

impl PickleWriter {
    pub fn new(options: PickleOptions) -> Self {
        PickleWriter {
            out: String::new(),
            options,
            depth: 0,
            inline: 0,
            pending: Pending::None,
        }
    }

    fn separate(&mut self, opening: bool) {
        match self.pending {
            Pending::None => {}
            Pending::Key => self.out.push(' '),
            Pending::Token => {
                if opening && self.options.indent && self.inline == 0 {
                    self.out.push('\n');
                    for _ in 0..self.depth {
                        self.out.push_str(INDENT);
                    }
                } else {
                    self.out.push(' ');
                }
            }
        }
    }

    fn colored(&mut self, color: &str, text: &str) {
        if self.options.use_colors {
            self.out.push_str(color);
            self.out.push_str(text);
            self.out.push_str(RESET);
        } else {
            self.out.push_str(text);
        }
    }

    fn atom(&mut self, text: &str) {
        self.separate(false);
        self.out.push_str(text);
        self.pending = Pending::Token;
    }

    /// `(Name`; fields follow, then [`PickleWriter::close`].
    pub fn open_variant(&mut self, name: &str) {
        self.separate(true);
        self.out.push('(');
        self.colored(VARIANT_COLOR, name);
        self.depth += 1;
        self.pending = Pending::Token;
    }

    /// `(` of an unnamed record.
    pub fn open_record(&mut self) {
        self.separate(true);
        self.out.push('(');
        self.depth += 1;
        self.pending = Pending::None;
    }

    pub fn close(&mut self) {
        self.out.push(')');
        self.depth = self.depth.saturating_sub(1);
        self.pending = Pending::Token;
    }

    pub fn open_seq(&mut self) {
        self.separate(true);
        self.out.push('[');
        self.depth += 1;
        self.pending = Pending::None;
    }

    pub fn close_seq(&mut self) {
        self.out.push(']');
        self.depth = self.depth.saturating_sub(1);
        self.pending = Pending::Token;
    }

    /// Suppress line breaks until the matching [`PickleWriter::end_inline`].
    pub fn begin_inline(&mut self) {
        self.inline += 1;
    }

    pub fn end_inline(&mut self) {
        self.inline = self.inline.saturating_sub(1);
    }

    pub fn int(&mut self, value: i64) {
        self.atom(&value.to_string());
    }

    pub fn float(&mut self, value: f64) {
        self.atom(&format!("{value:?}"));
    }

    pub fn bool(&mut self, value: bool) {
        self.atom(if value { ".true." } else { ".false." });
    }

    pub fn string(&mut self, value: &str) {
        self.atom(&format!("{value:?}"));
    }

    pub fn ident(&mut self, value: &str) {
        self.atom(value);
    }

    pub fn enum_value(&mut self, name: &str) {
        self.separate(false);
        self.colored(ENUM_COLOR, name);
        self.pending = Pending::Token;
    }

    /// Marker for an absent optional field.
    pub fn absent(&mut self) {
        self.atom("()");
    }

    /// A non-owning symbol reference: home table counter, then name.
    pub fn symbol_ref(&mut self, counter: u64, name: &str) {
        self.atom(&format!("{counter} {name}"));
    }

    /// A non-owning table reference renders as its counter.
    pub fn scope_ref(&mut self, counter: u64) {
        self.atom(&counter.to_string());
    }

    /// `(SymbolTable counter {`; entries follow, then [`PickleWriter::close_scope`].
    pub fn open_scope(&mut self, counter: u64) {
        self.separate(true);
        self.out.push('(');
        self.colored(VARIANT_COLOR, "SymbolTable");
        self.out.push(' ');
        self.out.push_str(&counter.to_string());
        self.out.push_str(" {");
        self.depth += 1;
        self.pending = Pending::None;
    }

    /// `name:` key of the next table entry.
    pub fn scope_entry(&mut self, name: &str) {
        if self.pending != Pending::None {
            self.out.push(',');
            self.separate(true);
        }
        self.out.push_str(name);
        self.out.push(':');
        self.pending = Pending::Key;
    }

    pub fn close_scope(&mut self) {
        self.out.push_str("})");
        self.depth = self.depth.saturating_sub(1);
        self.pending = Pending::Token;
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Writer for the indented tree form.
///
/// ```text
/// Add
/// |-left=IntConst
/// | └-n=3
/// └-right=IntConst
///   └-n=4
/// ```
pub struct TreeWriter {
    out: String,
    prefix: String,
    marks: Vec<usize>,
    use_colors: bool,
}

impl TreeWriter {
    pub fn new(use_colors: bool) -> Self {
        TreeWriter {
            out: String::new(),
            prefix: String::new(),
            marks: Vec::new(),
            use_colors,
        }
    }

    /// Start a child line: connector then `label`, no line break.
    pub fn label(&mut self, last: bool, label: &str) {
        self.out.push_str(&self.prefix);
        self.out.push_str(if last { "└-" } else { "|-" });
        self.out.push_str(label);
    }

    /// Finish the current line with a variant name.
    pub fn head(&mut self, name: &str) {
        if self.use_colors {
            self.out.push_str(VARIANT_COLOR);
            self.out.push_str(name);
            self.out.push_str(RESET);
        } else {
            self.out.push_str(name);
        }
        self.out.push('\n');
    }

    /// Finish the current line with a plain value.
    pub fn value(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn enum_value(&mut self, name: &str) {
        if self.use_colors {
            self.out.push_str(ENUM_COLOR);
            self.out.push_str(name);
            self.out.push_str(RESET);
        } else {
            self.out.push_str(name);
        }
        self.out.push('\n');
    }

    /// Indent for the children of the line just written.
    pub fn push(&mut self, last: bool) {
        self.marks.push(self.prefix.len());
        self.prefix.push_str(if last { "  " } else { "| " });
    }

    pub fn pop(&mut self) {
        if let Some(len) = self.marks.pop() {
            self.prefix.truncate(len);
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Remove ANSI color sequences from rendered text.
pub fn strip_colors(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

//! Line-oriented text buffer for the emitted Python program.

/// Four spaces, the only indentation the emitted program uses
const INDENT: &str = "    ";

/// Accumulates program text with a current indentation depth
#[derive(Debug, Default)]
pub struct ScriptWriter {
    buf: String,
    depth: usize,
}

impl ScriptWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one line at the current depth
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(INDENT);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Single-line comment; embedded line breaks are flattened
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.line(format!("# {}", one_line(text.as_ref())));
    }

    /// Opens a section that external tooling can locate
    pub fn section(&mut self, name: &str) {
        self.line(format!("# ==== [SECTION:{}] ====", name));
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Run `body` one level deeper
    pub fn block(&mut self, body: impl FnOnce(&mut Self)) {
        self.indent();
        body(self);
        self.dedent();
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Python string literal for arbitrary text
pub fn py_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Python float literal; always carries a decimal point
pub fn py_float(value: f64) -> String {
    let text = format!("{}", value);
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

fn one_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

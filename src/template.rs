use std::path::Path;

const TEXT_PLACEHOLDER: &str = "{text}";
const PERCENT_PLACEHOLDER: &str = "{percent}";

// default template used by the bundled index page
const PROGRESS_HTML: &str = include_str!("../views/progress.html");

/// presentation template for one status line: `{text}` receives the label,
/// `{percent}` the whole-number percentage.
///
/// html templates escape the label, since it can carry arbitrary error text.
#[derive(Debug, Clone)]
pub struct ProgressTemplate {
    source: String,
    escape_html: bool,
}

impl ProgressTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            escape_html: false,
        }
    }

    /// emits the label alone
    pub fn plain() -> Self {
        Self::new(TEXT_PLACEHOLDER)
    }

    pub fn html() -> Self {
        Self::new(PROGRESS_HTML).with_html_escaping(true)
    }

    /// `.html`/`.htm` files get their label escaped
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let is_html = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(source).with_html_escaping(is_html))
    }

    pub fn with_html_escaping(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub fn render(&self, text: &str, percent: f64) -> String {
        let text = if self.escape_html {
            escape_html(text)
        } else {
            text.to_string()
        };
        self.source
            .replace(PERCENT_PLACEHOLDER, &format!("{:.0}", percent))
            .replace(TEXT_PLACEHOLDER, &text)
    }
}

impl Default for ProgressTemplate {
    fn default() -> Self {
        Self::html()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

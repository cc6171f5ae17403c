use unicode_width::UnicodeWidthStr;

/// Minimum width of the `=` rule under a report title.
pub const MIN_RULE_WIDTH: usize = 60;

/// Report header rendering three or four lines:
///
/// 1. The report title in capitals.
/// 2. A `=` rule at least [`MIN_RULE_WIDTH`] columns wide, wider when the
///    title is.
/// 3. Optional `[ a | b ]` context such as directory and timezone.
/// 4. An empty line.
pub struct Header<'a> {
    pub title: &'a str,
    pub context: Vec<String>,
}

impl<'a> Header<'a> {
    pub fn new(title: &'a str) -> Self {
        Self {
            title,
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, item: impl Into<String>) -> Self {
        self.context.push(item.into());
        self
    }

    pub fn to_lines(&self) -> Vec<String> {
        let title = self.title.to_uppercase();
        let rule = "=".repeat(title.width().max(MIN_RULE_WIDTH));

        let mut lines = vec![title, rule];
        if !self.context.is_empty() {
            lines.push(format!("[ {} ]", self.context.join(" | ")));
        }
        lines.push(String::new());
        lines
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

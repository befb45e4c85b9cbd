//! Minimal form model for the terminal UI: a vertical list of editable fields.

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Secret,
    Choice(Vec<String>),
    Number { min: u32, max: u32 },
    Toggle,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: String,
    pub choice: usize,
    pub number: u32,
    pub checked: bool,
}

impl Field {
    pub fn text(label: &'static str) -> Self {
        Self::new(label, FieldKind::Text)
    }

    pub fn secret(label: &'static str) -> Self {
        Self::new(label, FieldKind::Secret)
    }

    pub fn choice<S: ToString>(label: &'static str, options: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            label,
            FieldKind::Choice(options.into_iter().map(|o| o.to_string()).collect()),
        )
    }

    pub fn number(label: &'static str, min: u32, max: u32, initial: u32) -> Self {
        let mut field = Self::new(label, FieldKind::Number { min, max });
        field.number = initial.clamp(min, max);
        field
    }

    pub fn toggle(label: &'static str) -> Self {
        Self::new(label, FieldKind::Toggle)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    fn new(label: &'static str, kind: FieldKind) -> Self {
        Self {
            label,
            kind,
            value: String::new(),
            choice: 0,
            number: 0,
            checked: false,
        }
    }

    pub fn accepts_text(&self) -> bool {
        matches!(self.kind, FieldKind::Text | FieldKind::Secret)
    }

    /// Text shown in the form body.
    pub fn display(&self) -> String {
        match &self.kind {
            FieldKind::Text => self.value.clone(),
            FieldKind::Secret => "•".repeat(self.value.chars().count()),
            FieldKind::Choice(options) => format!(
                "◀ {} ▶",
                options.get(self.choice).map(String::as_str).unwrap_or("")
            ),
            FieldKind::Number { .. } => format!("◀ {} ▶", self.number),
            FieldKind::Toggle => if self.checked { "[x]" } else { "[ ]" }.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<Field>,
    pub focused: usize,
}

impl Form {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, focused: 0 }
    }

    pub fn next(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + 1) % self.fields.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.fields.is_empty() {
            self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
        }
    }

    fn current(&mut self) -> Option<&mut Field> {
        self.fields.get_mut(self.focused)
    }

    pub fn input_char(&mut self, c: char) {
        if let Some(field) = self.current() {
            match field.kind {
                FieldKind::Text | FieldKind::Secret => field.value.push(c),
                FieldKind::Toggle if c == ' ' => field.checked = !field.checked,
                _ => {}
            }
        }
    }

    pub fn backspace(&mut self) {
        if let Some(field) = self.current() {
            if field.accepts_text() {
                field.value.pop();
            }
        }
    }

    /// Left/Right: cycle a choice or step a number.
    pub fn step(&mut self, forward: bool) {
        if let Some(field) = self.current() {
            match &field.kind {
                FieldKind::Choice(options) if !options.is_empty() => {
                    let len = options.len();
                    field.choice = if forward {
                        (field.choice + 1) % len
                    } else {
                        (field.choice + len - 1) % len
                    };
                }
                FieldKind::Number { min, max } => {
                    field.number = if forward {
                        (field.number + 1).min(*max)
                    } else {
                        field.number.saturating_sub(1).max(*min)
                    };
                }
                FieldKind::Toggle => field.checked = !field.checked,
                _ => {}
            }
        }
    }

    fn field(&self, label: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.label == label)
    }

    pub fn value(&self, label: &str) -> &str {
        self.field(label).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn choice(&self, label: &str) -> usize {
        self.field(label).map(|f| f.choice).unwrap_or(0)
    }

    pub fn number(&self, label: &str) -> u32 {
        self.field(label).map(|f| f.number).unwrap_or(0)
    }

    pub fn checked(&self, label: &str) -> bool {
        self.field(label).map(|f| f.checked).unwrap_or(false)
    }

    pub fn set_value(&mut self, label: &str, value: impl Into<String>) {
        if let Some(field) = self.fields.iter_mut().find(|f| f.label == label) {
            field.value = value.into();
        }
    }

    /// Reset every text field and toggle, keeping choices.
    pub fn clear_text(&mut self) {
        for field in &mut self.fields {
            if field.accepts_text() {
                field.value.clear();
            }
            field.checked = false;
        }
        self.focused = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Form {
        Form::new(vec![
            Field::text("Name"),
            Field::secret("Password"),
            Field::choice("Mode", ["A", "B", "C"]),
            Field::number("Age", 1, 120, 25),
            Field::toggle("Emergency"),
        ])
    }

    #[test]
    fn test_typing_goes_to_focused_text_field() {
        let mut form = sample();
        for c in "ana".chars() {
            form.input_char(c);
        }
        form.backspace();
        assert_eq!(form.value("Name"), "an");

        form.next();
        form.input_char('x');
        assert_eq!(form.fields[1].display(), "•");
    }

    #[test]
    fn test_choice_and_number_stepping() {
        let mut form = sample();
        form.focused = 2;
        form.step(false);
        assert_eq!(form.choice("Mode"), 2);
        form.step(true);
        assert_eq!(form.choice("Mode"), 0);

        form.next();
        for _ in 0..200 {
            form.step(true);
        }
        assert_eq!(form.number("Age"), 120);
        for _ in 0..200 {
            form.step(false);
        }
        assert_eq!(form.number("Age"), 1);
    }

    #[test]
    fn test_toggle_and_wraparound() {
        let mut form = sample();
        form.prev();
        assert_eq!(form.focused, 4);
        form.input_char(' ');
        assert!(form.checked("Emergency"));
        form.clear_text();
        assert!(!form.checked("Emergency"));
        assert_eq!(form.focused, 0);
    }
}

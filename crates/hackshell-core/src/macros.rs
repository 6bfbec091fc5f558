/// Named input lines, kept in definition order.
#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    entries: Vec<(String, String)>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or overwrites `name`. An overwritten macro keeps its position.
    pub fn set(&mut self, name: impl Into<String>, input: impl Into<String>) {
        let name = name.into();
        let input = input.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = input,
            None => self.entries.push((name, input)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, input)| input.as_str())
    }

    /// `name = input` lines in definition order.
    pub fn listing(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, input)| format!("{name} = {input}"))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::collections::BTreeMap;

/// An error location shown on an editor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMark {
    /// 0-based line index.
    pub line: u32,
    pub message: String,
}

/// Mirror of the editor buffers the UI has open, so highlight decisions stay pure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorBuffers {
    open: BTreeMap<String, Option<ErrorMark>>,
}

impl EditorBuffers {
    pub fn is_open(&self, name: &str) -> bool {
        self.open.contains_key(name)
    }

    pub fn open(&mut self, name: &str) {
        self.open.entry(name.to_string()).or_insert(None);
    }

    pub fn close(&mut self, name: &str) {
        self.open.remove(name);
    }

    pub fn close_all(&mut self) {
        self.open.clear();
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(mark) = self.open.remove(from) {
            self.open.insert(to.to_string(), mark);
        }
    }

    /// Attaches `mark` to the buffer called `name`. Returns false if no such
    /// buffer is open.
    pub fn highlight(&mut self, name: &str, mark: ErrorMark) -> bool {
        match self.open.get_mut(name) {
            Some(slot) => {
                *slot = Some(mark);
                true
            }
            None => false,
        }
    }

    /// Editing a buffer drops its error highlight.
    pub fn clear_highlight(&mut self, name: &str) {
        if let Some(slot) = self.open.get_mut(name) {
            *slot = None;
        }
    }

    pub fn highlight_of(&self, name: &str) -> Option<&ErrorMark> {
        self.open.get(name).and_then(Option::as_ref)
    }

    pub fn names(&self) -> Vec<String> {
        self.open.keys().cloned().collect()
    }
}

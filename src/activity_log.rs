/// Append-only text log shown to the user.
///
/// Entries are also forwarded to the `log` facade so they reach whatever
/// logger the binary installed.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Vec<String>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{}", message);
        self.entries.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.entries.push(message);
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest entry on top, the way the log pane reads.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .rev()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub const RECENTS_MAX_ENTRIES: usize = 5;

/// Most-recently-opened study ids, newest first. Ids are opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recents {
    ids: Vec<String>,
}

impl Recents {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn mark_opened(&mut self, id: &str) {
        if let Some(existing_index) = self.ids.iter().position(|existing| existing == id) {
            self.ids.remove(existing_index);
        }
        self.ids.insert(0, id.to_string());
        if self.ids.len() > RECENTS_MAX_ENTRIES {
            self.ids.truncate(RECENTS_MAX_ENTRIES);
        }
    }
}

use crate::models::entry::ResultEntry;

/// Generation counter identifying one search session. Every async
/// completion carries the id it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// State for one search term, from its first page request until a new
/// search replaces it.
#[derive(Debug, Clone)]
pub struct SearchSession {
    id: SessionId,
    term: String,
    current_page: u32,
    total_pages: Option<u32>,
    entries: Vec<ResultEntry>,
    pub(crate) in_flight: bool,
}

impl SearchSession {
    pub fn new(id: SessionId, term: &str) -> Self {
        Self {
            id,
            term: term.to_string(),
            current_page: 1,
            total_pages: None,
            entries: Vec::new(),
            in_flight: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Next page to request.
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// `None` until a response reported it.
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn exhausted(&self) -> bool {
        match self.total_pages {
            Some(total) => self.current_page > total,
            None => false,
        }
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut ResultEntry> {
        self.entries.get_mut(index)
    }

    /// Appends one page worth of entries and advances the page counter.
    /// Returns the index of the first appended entry.
    pub(crate) fn merge_page(&mut self, total_pages: Option<u32>, entries: Vec<ResultEntry>) -> usize {
        if let Some(total) = total_pages {
            self.total_pages = Some(total);
        }
        let start = self.entries.len();
        self.entries.extend(entries);
        self.current_page += 1;
        start
    }
}

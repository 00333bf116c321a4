use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::GeocodeError;
use crate::geocoding::Geocoder;
use crate::types::{Place, Suggestion};

pub const DEBOUNCE: Duration = Duration::from_millis(250);
pub const BLUR_DELAY: Duration = Duration::from_millis(150);
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Down,
    Up,
    Enter,
    Escape,
}

/// Where focus went after the text field lost it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    SuggestionList,
    Elsewhere,
}

/// A search that was issued and may still be answered. Answers for any ticket
/// other than the latest one are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    seq: u64,
    pub text: String,
}

pub type PlaceCallback = Box<dyn FnMut(Option<&Place>) + Send>;

/// Autocomplete state for the birth place field.
pub struct PlaceResolver<G> {
    geocoder: G,
    query: String,
    suggestions: Vec<Suggestion>,
    loading: bool,
    open: bool,
    highlighted: Option<usize>,
    place: Option<Place>,
    no_results: bool,
    last_seq: u64,
    on_place: Option<PlaceCallback>,
}

impl<G: Geocoder> PlaceResolver<G> {
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            query: String::new(),
            suggestions: Vec::new(),
            loading: false,
            open: false,
            highlighted: None,
            place: None,
            no_results: false,
            last_seq: 0,
            on_place: None,
        }
    }

    /// Called with the new place on selection and with `None` when an edit
    /// invalidates it.
    pub fn on_place_change(
        mut self,
        callback: impl FnMut(Option<&Place>) + Send + 'static,
    ) -> Self {
        self.on_place = Some(Box::new(callback));
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn place(&self) -> Option<&Place> {
        self.place.as_ref()
    }

    /// True when the last answered query matched nothing.
    pub fn shows_no_results(&self) -> bool {
        self.open && !self.loading && self.no_results
    }

    /// Raw text edit. Drops any resolved place so it has to be picked again.
    pub fn input(&mut self, text: impl Into<String>) {
        self.query = text.into();
        if self.place.take().is_some() {
            log::debug!("Place cleared by edit");
            self.notify();
        }
    }

    /// Starts a search for debounced text. Short queries clear the list and
    /// issue nothing.
    pub fn begin_search(&mut self, text: &str) -> Option<SearchTicket> {
        self.last_seq += 1;
        let text = text.trim();
        if text.chars().count() < MIN_QUERY_CHARS {
            self.suggestions.clear();
            self.loading = false;
            self.open = false;
            self.highlighted = None;
            self.no_results = false;
            return None;
        }
        self.loading = true;
        Some(SearchTicket {
            seq: self.last_seq,
            text: text.to_string(),
        })
    }

    /// Applies an answer. Returns false when the ticket was superseded.
    pub fn finish_search(
        &mut self,
        ticket: &SearchTicket,
        result: Result<Vec<Suggestion>, GeocodeError>,
    ) -> bool {
        if ticket.seq != self.last_seq {
            log::debug!("Dropping stale results for {:?}", ticket.text);
            return false;
        }
        self.loading = false;
        match result {
            Ok(suggestions) => {
                self.no_results = suggestions.is_empty();
                self.suggestions = suggestions;
                self.open = true;
                self.highlighted = None;
            }
            Err(e) => {
                log::error!("Place search for {:?} failed: {e}", ticket.text);
                self.suggestions.clear();
                self.no_results = false;
            }
        }
        true
    }

    pub async fn search(&mut self, text: &str) {
        if let Some(ticket) = self.begin_search(text) {
            let result = self.geocoder.search(&ticket.text).await;
            self.finish_search(&ticket, result);
        }
    }

    /// Picks suggestion `index`, fills the field with its label and closes the list.
    pub fn select(&mut self, index: usize) -> Option<Place> {
        let suggestion = self.suggestions.get(index)?;
        let place = suggestion.to_place();
        self.query = suggestion.label();
        log::info!("Selected {} ({})", self.query, place.timezone);
        self.place = Some(place.clone());
        self.open = false;
        self.highlighted = None;
        self.notify();
        Some(place)
    }

    /// Keyboard navigation. Only reacts while the list is open; Enter on a
    /// highlighted suggestion returns the selected place.
    pub fn handle_key(&mut self, key: Key) -> Option<Place> {
        if !self.open {
            return None;
        }
        match key {
            Key::Down => {
                let last = self.suggestions.len().checked_sub(1)?;
                self.highlighted = Some(self.highlighted.map_or(0, |i| (i + 1).min(last)));
                None
            }
            Key::Up => {
                self.highlighted = self.highlighted.and_then(|i| i.checked_sub(1));
                None
            }
            Key::Enter => self.highlighted.and_then(|i| self.select(i)),
            Key::Escape => {
                self.open = false;
                self.highlighted = None;
                None
            }
        }
    }

    pub fn focus(&mut self) {
        if !self.suggestions.is_empty() {
            self.open = true;
        }
    }

    /// The field lost focus. Waits [`BLUR_DELAY`] so a click on a suggestion
    /// lands first, then asks `focus` where focus went.
    pub async fn blur(&mut self, focus: impl FnOnce() -> Focus) {
        tokio::time::sleep(BLUR_DELAY).await;
        self.blur_elapsed(focus());
    }

    pub fn blur_elapsed(&mut self, focus: Focus) {
        if focus == Focus::Elsewhere {
            self.open = false;
        }
    }

    fn notify(&mut self) {
        if let Some(callback) = self.on_place.as_mut() {
            callback(self.place.as_ref());
        }
    }
}

/// Coalesces raw text changes into values that stayed unchanged for the
/// quiet interval.
pub struct Debouncer {
    rx: mpsc::UnboundedReceiver<String>,
    quiet: Duration,
    last: Option<String>,
}

impl Debouncer {
    pub fn new(rx: mpsc::UnboundedReceiver<String>, quiet: Duration) -> Self {
        Self {
            rx,
            quiet,
            last: None,
        }
    }

    /// Forgets the last settled value. Call it when a suggestion is selected,
    /// so retyping the same query searches again.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Next settled value, or `None` once the sender is gone. A value equal to
    /// the previously settled one is not yielded twice in a row.
    pub async fn next_settled(&mut self) -> Option<String> {
        loop {
            let mut pending = self.rx.recv().await?;
            while let Ok(Some(text)) = tokio::time::timeout(self.quiet, self.rx.recv()).await {
                pending = text;
            }
            if self.last.as_deref() != Some(pending.as_str()) {
                self.last = Some(pending.clone());
                return Some(pending);
            }
        }
    }
}

use selfpromo_core::Item;
use tracing::warn;

/// Items ordered newest first. Early exits in the history and window scans
/// rely on this ordering, so it is checked on construction.
#[derive(Debug, Clone, Default)]
pub struct ActivityStream {
    items: Vec<Item>,
}

impl ActivityStream {
    pub fn from_fetched(mut items: Vec<Item>) -> Self {
        let ordered = items
            .windows(2)
            .all(|pair| pair[0].created_utc() >= pair[1].created_utc());
        if !ordered {
            warn!(
                "Received {} items out of newest-first order, re-sorting",
                items.len()
            );
            items.sort_by(|a, b| b.created_utc().cmp(&a.created_utc()));
        }
        Self { items }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//! Terminal renderings of the browse, detail and suggestion views, plus the
//! delete flow.

use crate::client::suggest::SuggestionState;
use crate::client::ListingsClient;
use crate::domain::model::Listing;
use crate::utils::error::Result;
use std::fmt::Write;

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this car?";

/// Image carousel on the detail page. Navigation wraps around at both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    images: Vec<String>,
    index: usize,
}

impl Gallery {
    pub fn new(images: Vec<String>) -> Self {
        Self { images, index: 0 }
    }

    pub fn current(&self) -> Option<&str> {
        self.images.get(self.index).map(String::as_str)
    }

    pub fn next(&mut self) {
        if !self.images.is_empty() {
            self.index = (self.index + 1) % self.images.len();
        }
    }

    pub fn prev(&mut self) {
        if !self.images.is_empty() {
            self.index = (self.index + self.images.len() - 1) % self.images.len();
        }
    }

    /// One-based position and total, e.g. `(2, 5)`.
    pub fn position(&self) -> (usize, usize) {
        if self.images.is_empty() {
            (0, 0)
        } else {
            (self.index + 1, self.images.len())
        }
    }
}

pub fn render_card(listing: &Listing) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", listing.title);
    let _ = writeln!(out, "  {}", listing.price_range);
    match listing.images.first() {
        Some(cover) => {
            let _ = writeln!(out, "  cover: {}", cover);
        }
        None => {
            let _ = writeln!(out, "  cover: (no image)");
        }
    }
    if !listing.tags.is_empty() {
        let _ = writeln!(out, "  tags: {}", listing.tags.join(", "));
    }
    let _ = write!(out, "  View details: {}", listing.id);
    out
}

pub fn render_detail(listing: &Listing, gallery: &Gallery) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", listing.title);
    let _ = writeln!(out, "{}", "=".repeat(listing.title.chars().count().max(3)));

    match gallery.current() {
        Some(image) => {
            let (position, total) = gallery.position();
            let _ = writeln!(out, "[{}/{}] {}", position, total, image);
        }
        None => {
            let _ = writeln!(out, "(no images)");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", listing.description);
    let _ = writeln!(out);
    let _ = writeln!(out, "Price range: {}", listing.price_range);
    if !listing.tags.is_empty() {
        let _ = writeln!(out, "Tags: {}", listing.tags.join(", "));
    }
    let _ = write!(
        out,
        "Listed {} (updated {})",
        listing.created_at.format("%Y-%m-%d"),
        listing.updated_at.format("%Y-%m-%d %H:%M")
    );
    out
}

pub fn render_suggestions(state: &SuggestionState) -> String {
    if state.loading && state.suggestions.is_empty() {
        return "  searching...".to_string();
    }

    state
        .suggestions
        .iter()
        .map(|s| format!("  {}  ({})", s.title, s.id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interactive yes/no step before a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    /// The listing is gone; the caller shows the listing index.
    RedirectToIndex,
}

pub async fn delete_with_confirmation<C: Confirm + ?Sized>(
    client: &ListingsClient,
    id: &str,
    confirm: &mut C,
) -> Result<DeleteOutcome> {
    if !confirm.confirm(DELETE_PROMPT) {
        tracing::debug!("Delete of {} cancelled", id);
        return Ok(DeleteOutcome::Cancelled);
    }

    client.delete(id).await?;
    tracing::info!("Deleted car {}", id);
    Ok(DeleteOutcome::RedirectToIndex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ListingSummary;
    use chrono::{TimeZone, Utc};

    fn listing(images: Vec<&str>) -> Listing {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        Listing {
            id: "swift-1".to_string(),
            title: "Maruti Suzuki Swift".to_string(),
            description: "Petrol hatchback".to_string(),
            price_range: "₹6,00,000 - ₹9,00,000".to_string(),
            images: images.into_iter().map(str::to_string).collect(),
            tags: vec!["petrol".to_string()],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_gallery_wraps_both_ways() {
        let mut gallery = Gallery::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(gallery.current(), Some("a"));

        gallery.prev();
        assert_eq!(gallery.current(), Some("c"));
        assert_eq!(gallery.position(), (3, 3));

        gallery.next();
        gallery.next();
        assert_eq!(gallery.current(), Some("b"));
    }

    #[test]
    fn test_empty_gallery() {
        let mut gallery = Gallery::default();
        gallery.next();
        gallery.prev();
        assert_eq!(gallery.current(), None);
        assert_eq!(gallery.position(), (0, 0));
    }

    #[test]
    fn test_render_card_and_detail() {
        let listing = listing(vec!["/images/front.jpg", "/images/back.jpg"]);

        let card = render_card(&listing);
        assert!(card.starts_with("Maruti Suzuki Swift\n"));
        assert!(card.contains("cover: /images/front.jpg"));
        assert!(card.ends_with("View details: swift-1"));

        let mut gallery = Gallery::new(listing.images.clone());
        gallery.next();
        let detail = render_detail(&listing, &gallery);
        assert!(detail.contains("[2/2] /images/back.jpg"));
        assert!(detail.contains("Price range: ₹6,00,000 - ₹9,00,000"));
        assert!(detail.contains("Listed 2024-03-01"));

        let bare = self::listing(vec![]);
        assert!(render_card(&bare).contains("(no image)"));
    }

    #[test]
    fn test_render_suggestions() {
        let state = SuggestionState {
            query: "sw".to_string(),
            suggestions: vec![ListingSummary {
                id: "swift-1".to_string(),
                title: "Maruti Suzuki Swift".to_string(),
            }],
            loading: false,
            revision: 1,
        };
        assert_eq!(render_suggestions(&state), "  Maruti Suzuki Swift  (swift-1)");

        let loading = SuggestionState {
            loading: true,
            ..Default::default()
        };
        assert_eq!(render_suggestions(&loading), "  searching...");
    }

    #[tokio::test]
    async fn test_cancelled_delete_sends_nothing() {
        // Nothing listens on the discard port; a request would fail.
        let client = ListingsClient::new("http://127.0.0.1:9").unwrap();
        let mut prompts = Vec::new();
        let mut decline = |prompt: &str| {
            prompts.push(prompt.to_string());
            false
        };

        let outcome = delete_with_confirmation(&client, "swift-1", &mut decline)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(prompts, vec![DELETE_PROMPT]);
    }
}

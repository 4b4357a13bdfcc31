use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Why a listing stopped producing pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last page carried fewer items than requested.
    ShortPage,
    /// The last page carried nothing.
    EmptyPage,
    /// The configured page cap was reached; more data may exist.
    PageCap,
    /// A single unpaginated request.
    SinglePage,
    /// Page `page` (1-based) failed; earlier pages are kept.
    Failed { page: usize, message: String },
    /// Item `index` did not match the expected record shape.
    Undecodable { index: usize, message: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::ShortPage => write!(f, "short page"),
            StopReason::EmptyPage => write!(f, "empty page"),
            StopReason::PageCap => write!(f, "page cap reached"),
            StopReason::SinglePage => write!(f, "single page"),
            StopReason::Failed { page, message } => write!(f, "page {page} failed: {message}"),
            StopReason::Undecodable { index, message } => {
                write!(f, "item {index} could not be decoded: {message}")
            }
        }
    }
}

/// Every item gathered from one listing, in page-arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<T> {
    pub items: Vec<T>,
    pub pages_fetched: usize,
    pub stop: StopReason,
}

impl<T> Aggregate<T> {
    pub fn new(items: Vec<T>, pages_fetched: usize, stop: StopReason) -> Self {
        Self {
            items,
            pages_fetched,
            stop,
        }
    }

    pub fn single_page(items: Vec<T>) -> Self {
        Self::new(items, 1, StopReason::SinglePage)
    }

    /// An aggregate for a request that failed before any page arrived.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(
            Vec::new(),
            0,
            StopReason::Failed {
                page: 1,
                message: message.into(),
            },
        )
    }

    pub fn total_count(&self) -> usize {
        self.items.len()
    }

    /// True when the listing ran to its natural end.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            StopReason::ShortPage | StopReason::EmptyPage | StopReason::SinglePage
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self.stop,
            StopReason::Failed { .. } | StopReason::Undecodable { .. }
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.stop {
            StopReason::Failed { message, .. } | StopReason::Undecodable { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl Aggregate<Value> {
    /// Decodes every item into `R`.
    ///
    /// Decoding stops at the first item that does not fit; the items decoded
    /// before it are kept and the aggregate is marked as undecodable.
    pub fn decode<R: DeserializeOwned>(self) -> Aggregate<R> {
        let mut items = Vec::with_capacity(self.items.len());
        let mut stop = self.stop;
        for (index, value) in self.items.into_iter().enumerate() {
            match serde_json::from_value::<R>(value) {
                Ok(record) => items.push(record),
                Err(err) => {
                    stop = StopReason::Undecodable {
                        index,
                        message: err.to_string(),
                    };
                    break;
                }
            }
        }
        Aggregate::new(items, self.pages_fetched, stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        id: String,
    }

    #[test]
    fn completeness_follows_stop_reason() {
        assert!(Aggregate::<u8>::new(vec![], 1, StopReason::EmptyPage).is_complete());
        assert!(!Aggregate::<u8>::new(vec![], 3, StopReason::PageCap).is_complete());
        assert!(!Aggregate::<u8>::new(vec![], 3, StopReason::PageCap).is_error());

        let failed = Aggregate::<u8>::failed("http status 500");
        assert!(failed.is_error());
        assert_eq!(failed.error_message(), Some("http status 500"));
        assert_eq!(failed.pages_fetched, 0);
    }

    #[test]
    fn decode_stops_at_first_bad_item() {
        let raw = Aggregate::new(
            vec![json!({"id": "a"}), json!({"name": "no id"}), json!({"id": "c"})],
            1,
            StopReason::ShortPage,
        );
        let decoded = raw.decode::<Named>();
        assert_eq!(decoded.items, vec![Named { id: "a".into() }]);
        assert!(matches!(decoded.stop, StopReason::Undecodable { index: 1, .. }));
        assert!(decoded.is_error());
    }
}

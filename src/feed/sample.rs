use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};

use crate::error::RemoteError;
use crate::models::{RawArticle, RawSource};

use super::source::RemoteSource;

/// Offline stand-in used when no API key is configured. Serves a fixed set
/// of headlines stamped relative to the time of the call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleSource;

impl SampleSource {
    pub fn new() -> Self {
        Self
    }

    fn articles(&self) -> Vec<RawArticle> {
        let now = Utc::now();
        let at = |hours: i64| (now - Duration::hours(hours)).to_rfc3339();

        vec![
            sample(
                ("techcrunch", "TechCrunch"),
                "Sarah Johnson",
                "Revolutionary AI Technology Transforms Healthcare Industry",
                "New artificial intelligence breakthrough promises to revolutionize patient care and medical diagnostics worldwide.",
                "https://example.com/article1",
                at(0),
                "A groundbreaking development in artificial intelligence is set to transform the healthcare industry...",
            ),
            sample(
                ("bbc-news", "BBC News"),
                "Michael Chen",
                "Global Climate Summit Reaches Historic Agreement",
                "World leaders commit to ambitious new carbon reduction targets in landmark environmental deal.",
                "https://example.com/article2",
                at(1),
                "In a historic moment for global environmental policy, representatives from over 190 countries...",
            ),
            sample(
                ("the-verge", "The Verge"),
                "Alex Rivera",
                "New Smartphone Features Push Boundaries of Innovation",
                "Latest flagship devices showcase cutting-edge technology and stunning design improvements.",
                "https://example.com/article3",
                at(2),
                "The technology industry continues to amaze with innovative features in the latest smartphone releases...",
            ),
            sample(
                ("espn", "ESPN"),
                "Jordan Thompson",
                "Underdog Team Secures Championship Victory",
                "Against all odds, the determined squad clinches an unexpected championship win.",
                "https://example.com/article4",
                at(3),
                "In a thrilling finale that had fans on the edge of their seats, the underdog team emerged victorious...",
            ),
            sample(
                ("bloomberg", "Bloomberg"),
                "Emily Watson",
                "Stock Markets Reach Record Highs Amid Economic Optimism",
                "Major indices surge as investors show renewed confidence in economic recovery.",
                "https://example.com/article5",
                at(1),
                "Financial markets experienced significant gains today as economic indicators continue to show...",
            ),
            sample(
                ("nature", "Nature"),
                "Dr. Robert Kim",
                "Scientists Discover Potential Cure for Rare Disease",
                "Breakthrough research offers hope to patients suffering from previously untreatable condition.",
                "https://example.com/article6",
                at(2),
                "A team of researchers has made a significant breakthrough in the treatment of a rare genetic disorder...",
            ),
        ]
    }
}

fn sample(
    (source_id, source_name): (&str, &str),
    author: &str,
    title: &str,
    description: &str,
    url: &str,
    published_at: String,
    content: &str,
) -> RawArticle {
    RawArticle {
        source: RawSource {
            id: Some(source_id.to_string()),
            name: source_name.to_string(),
        },
        author: Some(author.to_string()),
        title: title.to_string(),
        description: Some(description.to_string()),
        url: url.to_string(),
        url_to_image: None,
        published_at,
        content: Some(content.to_string()),
    }
}

/// Title keywords that place a sample headline in a category.
fn category_keywords(category: &str) -> Option<&'static [&'static str]> {
    let keywords: &'static [&'static str] = match category.to_ascii_lowercase().as_str() {
        "technology" => &["AI", "Smartphone", "Technology"],
        "business" => &["Stock", "Economic"],
        "science" => &["Scientists", "Research"],
        "health" => &["Healthcare", "Disease"],
        "sports" => &["Championship", "Team"],
        _ => return None,
    };
    Some(keywords)
}

#[async_trait]
impl RemoteSource for SampleSource {
    async fn fetch_headlines(&self, category: Option<&str>) -> Result<Vec<RawArticle>, RemoteError> {
        let articles = self.articles();
        let Some(keywords) = category.and_then(category_keywords) else {
            return Ok(articles);
        };

        Ok(articles
            .into_iter()
            .filter(|a| keywords.iter().any(|k| a.title.contains(k)))
            .collect())
    }

    async fn fetch_search(&self, query: &str) -> Result<Vec<RawArticle>, RemoteError> {
        let needle = query.to_lowercase();
        Ok(self
            .articles()
            .into_iter()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    async fn fetch_image(&self, _url: &str) -> Result<Bytes, RemoteError> {
        Err(RemoteError::ServerError(404))
    }
}

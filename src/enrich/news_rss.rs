use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::enrich::EnrichmentSource;
use crate::ingest::normalize_text;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// One top-stories headline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip)]
    pub published_at: Option<u64>, // unix seconds
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

/// Headline-list provider over an RSS feed (Google News top stories by default).
pub struct NewsRssProvider {
    url: String,
    max_items: usize,
    client: reqwest::Client,
}

impl NewsRssProvider {
    pub fn new(url: impl Into<String>, max_items: usize, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            max_items,
            client,
        }
    }

    pub fn parse_items_from_str(s: &str, max_items: usize) -> Result<Vec<Headline>> {
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(max_items));
        for it in rss.channel.item.into_iter() {
            if out.len() >= max_items {
                break;
            }
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            // Aggregator descriptions often just repeat "Headline - Outlet" as a link.
            let headline = title.rsplit_once(" - ").map_or(title.as_str(), |(h, _)| h);
            let description = it
                .description
                .as_deref()
                .map(normalize_text)
                .filter(|d| !d.is_empty() && !d.starts_with(headline));

            out.push(Headline {
                title,
                description,
                url: it.link,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl EnrichmentSource for NewsRssProvider {
    type Item = Headline;

    fn name(&self) -> &'static str {
        "news"
    }

    async fn try_fetch(&self) -> Result<Vec<Headline>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("news http get()")?
            .error_for_status()
            .context("news http status")?
            .text()
            .await
            .context("news http .text()")?;
        Self::parse_items_from_str(&body, self.max_items)
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pub_date_parses() {
        assert_eq!(
            parse_rfc2822_to_unix("Mon, 19 Oct 2026 12:00:00 +0000"),
            Some(1_792_411_200)
        );
        assert_eq!(parse_rfc2822_to_unix("yesterday"), None);
    }

    #[test]
    fn empty_channel_is_ok() {
        let xml = r#"<rss version="2.0"><channel><title>Top stories</title></channel></rss>"#;
        let items = NewsRssProvider::parse_items_from_str(xml, 10).unwrap();
        assert!(items.is_empty());
    }
}

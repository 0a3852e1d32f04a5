use zeitgeist::enrich::NewsRssProvider;

const NEWS_XML: &str = include_str!("fixtures/news_rss.xml");

#[test]
fn news_fixture_parses_headlines() {
    let items = NewsRssProvider::parse_items_from_str(NEWS_XML, 40).expect("news parse ok");

    let titles: Vec<_> = items.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Fed officials signal patience on further rate cuts - Reuters",
            "Oil climbs as OPEC weighs deeper output cuts",
            "Chipmakers rally after record quarterly guidance",
        ],
        "blank titles are skipped and entities decoded"
    );

    // Link-only description repeating the headline is dropped.
    assert_eq!(items[0].description, None);
    assert_eq!(
        items[1].description.as_deref(),
        Some("Brent crude rose for a third session on supply worries.")
    );
    assert_eq!(
        items[0].url.as_deref(),
        Some("https://news.google.com/rss/articles/abc123?oc=5")
    );
    assert_eq!(items[0].published_at, Some(1_792_411_200));
    assert_eq!(items[2].published_at, None);
}

#[test]
fn news_fixture_respects_max_items() {
    let items = NewsRssProvider::parse_items_from_str(NEWS_XML, 2).unwrap();
    assert_eq!(items.len(), 2);
}

#[test]
fn malformed_feed_is_an_error() {
    assert!(NewsRssProvider::parse_items_from_str("<html><body>503</body></html>", 10).is_err());
}

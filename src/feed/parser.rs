//! Payload parsing: raw fetched text → ordered list of [`NewsItem`]s.
//!
//! Parsing is total. A payload that cannot be understood produces an empty
//! list (logged at `warn`), so the caller's "no items" rendering path covers
//! both "feed is empty" and "feed is unusable".

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::source::{ContentKind, NewsItem};
use crate::util::text::{collapse_whitespace, head_chars, strip_tags, tail_chars};

/// Character budget for titles recovered from unstructured page text.
const FALLBACK_TITLE_CHARS: usize = 100;
/// Character budget for summaries extracted from HTML listings.
const SUMMARY_CHARS: usize = 200;

/// Parses a fetched payload according to the source's content kind.
pub fn parse_items(body: &str, kind: ContentKind) -> Vec<NewsItem> {
    match kind {
        ContentKind::Rss => match parse_rss(body) {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(error = %err, "feed XML unusable, degrading to empty list");
                Vec::new()
            }
        },
        ContentKind::Html => parse_listing_html(body),
    }
}

fn parse_rss(body: &str) -> Result<Vec<NewsItem>, feed_rs::parser::ParseFeedError> {
    let feed = feed_rs::parser::parse(body.as_bytes())?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .map(|t| collapse_whitespace(&t.content))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Notícia".to_string());
            let link = entry.links.first().map(|l| l.href.clone());
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|raw| strip_tags(&raw))
                .filter(|s| !s.is_empty());
            let published = entry.published.or(entry.updated);

            NewsItem {
                title,
                summary,
                published,
                link,
            }
        })
        .collect();

    Ok(items)
}

/// Scrapes a court news listing page.
///
/// Two passes: structured news elements first, then a date-anchored scan of
/// the main content text for pages that render their listing as plain
/// paragraphs. Either pass may legitimately find nothing.
fn parse_listing_html(body: &str) -> Vec<NewsItem> {
    let doc = Html::parse_document(body);

    let items = items_from_news_elements(&doc);
    if !items.is_empty() {
        return items;
    }

    items_from_date_anchors(&doc)
}

fn items_from_news_elements(doc: &Html) -> Vec<NewsItem> {
    let Ok(node_sel) = Selector::parse("article, .news-item, .noticia") else {
        return Vec::new();
    };
    let title_sel = Selector::parse("h1, h2, h3, h4, .title").ok();
    let date_sel = Selector::parse(".date, time").ok();
    let link_sel = Selector::parse("a[href]").ok();

    doc.select(&node_sel)
        .filter_map(|node| {
            let title = title_sel
                .as_ref()
                .and_then(|sel| node.select(sel).next())
                .map(|el| collapse_whitespace(&element_text(el)))
                .filter(|t| !t.is_empty())?;

            let date_text = date_sel
                .as_ref()
                .and_then(|sel| node.select(sel).next())
                .map(|el| collapse_whitespace(&element_text(el)));
            let full_text = collapse_whitespace(&element_text(node));
            let published = date_text
                .as_deref()
                .or(Some(full_text.as_str()))
                .and_then(parse_dotted_date);

            let link = link_sel
                .as_ref()
                .and_then(|sel| node.select(sel).next())
                .and_then(|el| el.value().attr("href"))
                .map(str::to_string);

            // Summary = the element's text minus the title and date lines
            let mut rest = full_text.replacen(&title, "", 1);
            if let Some(date) = &date_text {
                rest = rest.replacen(date.as_str(), "", 1);
            }
            let summary = head_chars(rest.trim(), SUMMARY_CHARS);
            let summary = (!summary.is_empty()).then_some(summary);

            Some(NewsItem {
                title,
                summary,
                published,
                link,
            })
        })
        .collect()
}

/// Fallback for pages without structured news markup: find `dd.mm.yyyy`
/// dates in the main content text and treat the text immediately before
/// each as the title and the text after as the summary.
fn items_from_date_anchors(doc: &Html) -> Vec<NewsItem> {
    let Ok(area_sel) = Selector::parse("main, .content, .container, #content") else {
        return Vec::new();
    };
    let Some(area) = doc.select(&area_sel).next() else {
        return Vec::new();
    };

    let text = collapse_whitespace(&element_text(area));
    let mut items = Vec::new();

    for m in dotted_date_pattern().find_iter(&text) {
        let title = tail_chars(text[..m.start()].trim_end(), FALLBACK_TITLE_CHARS);
        let summary = head_chars(text[m.end()..].trim_start(), SUMMARY_CHARS);
        if title.is_empty() || summary.is_empty() {
            continue;
        }

        items.push(NewsItem {
            title,
            summary: Some(summary),
            published: parse_dotted_date(m.as_str()),
            link: None,
        });
    }

    items
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn dotted_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").expect("static date pattern"))
}

/// Parses the first `dd.mm.yyyy` occurrence in the text, as the court
/// listings format their publication dates. Midnight UTC; the sources do
/// not publish a time of day.
fn parse_dotted_date(text: &str) -> Option<DateTime<Utc>> {
    let caps = dotted_date_pattern().captures(text)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

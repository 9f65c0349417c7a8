//! Widget state rendering.
//!
//! The renderer consumes [`WidgetEvent`]s and produces either terminal text
//! cards or JSON lines. All remote text passes through the hygiene helpers
//! before it reaches the terminal; summaries are bounded to
//! [`SUMMARY_DISPLAY_CHARS`] characters the way the site cards bound theirs.

use serde::Serialize;

use crate::feed::{NewsItem, WidgetEvent, WidgetState};
use crate::util::text::{sanitize_line, truncate_chars, truncate_to_width};

/// Display budget for one summary, in characters.
pub const SUMMARY_DISPLAY_CHARS: usize = 180;
/// Display budget for one title line, in terminal columns.
const TITLE_COLS: usize = 76;

/// Formats one widget event as a text block for the terminal.
pub fn render_event(event: &WidgetEvent) -> String {
    let name = &event.source.name;
    match &event.state {
        WidgetState::Loading => format!("[{name}] Carregando notícias...\n"),
        WidgetState::Ready(items) if items.is_empty() => {
            format!("[{name}] Sem notícias no momento.\n")
        }
        WidgetState::Ready(items) => {
            let mut out = format!("[{name}] {} notícias\n", items.len());
            for item in items {
                out.push_str(&render_card(item, &event.source.url));
            }
            out
        }
        WidgetState::RetryScheduled {
            attempt,
            delay,
            reason,
        } => format!(
            "[{name}] Tentativa {attempt} falhou ({}). Tentando novamente em {:.1}s...\n",
            sanitize_line(reason),
            delay.as_secs_f64()
        ),
        WidgetState::Failed { reason } => format!(
            "[{name}] Erro ao carregar notícias: {}. Tente novamente mais tarde.\n",
            sanitize_line(reason)
        ),
    }
}

fn render_card(item: &NewsItem, source_url: &str) -> String {
    let mut out = String::new();

    let title = truncate_to_width(&sanitize_line(&item.title), TITLE_COLS);
    out.push_str(&format!("  • {title}\n"));

    let mut meta = String::new();
    if let Some(published) = item.published {
        meta.push_str(&published.format("%d.%m.%Y").to_string());
    }
    if let Some(summary) = &item.summary {
        if !meta.is_empty() {
            meta.push_str(" — ");
        }
        meta.push_str(&truncate_chars(
            &sanitize_line(summary),
            SUMMARY_DISPLAY_CHARS,
        ));
    }
    if !meta.is_empty() {
        out.push_str(&format!("    {meta}\n"));
    }

    // Items scraped without a link point back at the source listing
    let link = item.link.as_deref().unwrap_or(source_url);
    out.push_str(&format!("    {link}\n"));

    out
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    source: &'a str,
    cycle: u64,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<&'a [NewsItem]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// Formats one widget event as a single JSON line.
pub fn render_event_json(event: &WidgetEvent) -> serde_json::Result<String> {
    let (state, items, reason) = match &event.state {
        WidgetState::Loading => ("loading", None, None),
        WidgetState::Ready(items) => ("ready", Some(items.as_slice()), None),
        WidgetState::RetryScheduled { reason, .. } => {
            ("retry-scheduled", None, Some(sanitize_line(reason)))
        }
        WidgetState::Failed { reason } => ("failed", None, Some(sanitize_line(reason))),
    };

    serde_json::to_string(&JsonEvent {
        source: &event.source.name,
        cycle: event.cycle,
        state,
        items,
        reason,
    })
}

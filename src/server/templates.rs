//! HTML templates for the dashboard.

use chrono::{DateTime, NaiveDate, Utc};

use crate::view::{DisplayRow, COLUMN_LABELS};

/// Base HTML page.
pub fn base_template(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - breachfeed</title>
    <link rel="stylesheet" href="/static/style.css">
</head>
<body>
    <header id="main-header">
        <nav>
            <a href="/" class="logo">breachfeed</a>
            <a href="/api/feed">json</a>
        </nav>
    </header>
    <main>
        <h1>{}</h1>
        {}
    </main>
</body>
</html>"#,
        html_escape(title),
        html_escape(title),
        content
    )
}

fn refresh_form() -> &'static str {
    r#"
    <form method="post" action="/refresh" class="refresh">
        <button type="submit" class="btn-small">refresh data</button>
    </form>
    "#
}

/// The recent-window table, or an empty-state notice when nothing is recent.
pub fn feed_section(
    rows: &[DisplayRow],
    since: NaiveDate,
    window_days: u32,
    generated_at: DateTime<Utc>,
) -> String {
    let generated = format!(
        r#"<p class="meta">Feed generated {}</p>"#,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    if rows.is_empty() {
        return format!(
            r#"
    <div class="notice">No breaches reported in the last {} days.</div>
    {}
    {}
    "#,
            window_days,
            generated,
            refresh_form()
        );
    }

    let header: String = COLUMN_LABELS
        .iter()
        .map(|label| format!("<th>{}</th>", label))
        .collect();

    let mut body = String::new();
    for row in rows {
        let link = match &row.source_link {
            Some(href) => format!(
                r#"<a href="{}" target="_blank" rel="noopener">link</a>"#,
                html_escape(href)
            ),
            None => String::new(),
        };
        body.push_str(&format!(
            r#"
        <tr>
            <td>{}</td>
            <td>{}</td>
            <td class="num">{}</td>
            <td class="num">{}</td>
            <td>{}</td>
            <td>{}</td>
        </tr>
        "#,
            html_escape(&row.entity_name),
            row.date_reported,
            row.total_affected,
            row.state_residents_affected,
            row.reporting_agency,
            link
        ));
    }

    format!(
        r#"
    <p class="summary"><strong>Showing {} breaches reported since {}</strong></p>
    <table class="breach-listing">
        <thead>
            <tr>{}</tr>
        </thead>
        <tbody>
            {}
        </tbody>
    </table>
    {}
    {}
    "#,
        rows.len(),
        since.format("%Y-%m-%d"),
        header,
        body,
        generated,
        refresh_form()
    )
}

/// Shown when every source came back without a single record.
pub fn no_data_notice() -> String {
    format!(
        r#"
    <div class="notice warning">No data was collected. Please check your internet connection and try again.</div>
    {}
    "#,
        refresh_form()
    )
}

/// Shown above a previous feed when the latest recompute failed.
pub fn stale_notice(error: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        r#"
    <div class="notice warning">Could not refresh the feed ({}). Showing data from {}.</div>
    "#,
        html_escape(error),
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

/// Shown when no feed could be produced at all.
pub fn failure_notice(error: &str) -> String {
    format!(
        r#"
    <div class="notice error">An error occurred: {}</div>
    <p>Please try refreshing the page.</p>
    {}
    "#,
        html_escape(error),
        refresh_form()
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// CSS styles for the dashboard - minimal text-based design.
pub const CSS: &str = r#"
:root {
    --bg: #fff;
    --text: #222;
    --text-muted: #666;
    --link: #0066cc;
    --link-hover: #004499;
    --border: #ccc;
    --highlight: #fffbcc;
    --warning: #8a6d00;
    --error: #b00020;
}

@media (prefers-color-scheme: dark) {
    :root {
        --bg: #1a1a1a;
        --text: #e0e0e0;
        --text-muted: #888;
        --link: #6ab0ff;
        --link-hover: #8dc4ff;
        --border: #444;
        --highlight: #3a3520;
        --warning: #e0c060;
        --error: #ff7070;
    }
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: 'Lucida Console', 'Courier New', monospace;
    font-size: 14px;
    background: var(--bg);
    color: var(--text);
    line-height: 1.5;
}

a { color: var(--link); text-decoration: none; }
a:hover { color: var(--link-hover); text-decoration: underline; }

#main-header {
    border-bottom: 1px solid var(--border);
    padding: 0.5rem 1rem;
    font-size: 13px;
}
#main-header nav a { margin-right: 1rem; }
#main-header .logo { font-weight: bold; color: var(--text); }

main {
    max-width: 1200px;
    margin: 0 auto;
    padding: 1rem;
}

h1 { font-size: 18px; margin-bottom: 1rem; }

.summary, .meta { margin: 0.5rem 0; }
.meta { color: var(--text-muted); font-size: 12px; }

.notice {
    border: 1px solid var(--border);
    padding: 0.5rem 0.75rem;
    margin: 0.5rem 0;
}
.notice.warning { color: var(--warning); }
.notice.error { color: var(--error); }

.breach-listing {
    width: 100%;
    border-collapse: collapse;
    font-size: 13px;
}

.breach-listing th,
.breach-listing td {
    padding: 0.4rem 0.75rem;
    text-align: left;
    border-bottom: 1px solid var(--border);
}

.breach-listing th {
    font-weight: bold;
    color: var(--text-muted);
    font-size: 11px;
    text-transform: uppercase;
    letter-spacing: 0.5px;
}

.breach-listing td.num { text-align: right; }
.breach-listing tr:hover { background: var(--highlight); }

.refresh { margin-top: 1rem; }

.btn-small {
    padding: 2px 8px;
    background: transparent;
    color: var(--link);
    border: 1px solid var(--border);
    font-family: inherit;
    font-size: 11px;
    cursor: pointer;
}
.btn-small:hover { background: var(--highlight); }
"#;

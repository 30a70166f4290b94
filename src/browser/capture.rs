use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::page::Page;

use crate::branding::BRAND_VARIABLES;
use crate::dom::{DomSnapshot, DomTree};

/// Computed style properties copied into the snapshot. Everything the
/// engines read through `Document::computed_style` must be listed here.
pub const CAPTURED_STYLES: &[&str] = &[
    "background-color",
    "border-radius",
    "color",
    "cursor",
    "display",
    "font-family",
    "opacity",
    "visibility",
];

/// Load `url` in the page and capture it.
pub async fn open(page: &Page, url: &str, settle: Duration) -> Result<DomTree> {
    tracing::info!("Opening {}", url);
    page.goto(url)
        .await
        .with_context(|| format!("Failed to navigate to {}", url))?;
    // goto() waits for the load event; give client-side rendering a moment.
    tokio::time::sleep(settle).await;
    capture(page).await
}

/// Navigate to a path on the current origin (tour continuation).
pub async fn navigate_path(page: &Page, path_and_query: &str) -> Result<DomTree> {
    let target = serde_json::to_string(path_and_query)?;
    page.evaluate(format!("window.location.assign({})", target))
        .await
        .with_context(|| format!("Failed to navigate to {}", path_and_query))?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    capture(page).await
}

/// Scroll the live page, then re-capture so rectangles match.
pub async fn scroll_to(page: &Page, x: f64, y: f64) -> Result<DomTree> {
    page.evaluate(format!("window.scrollTo({}, {})", x, y))
        .await
        .context("Failed to scroll")?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    capture(page).await
}

pub async fn capture(page: &Page) -> Result<DomTree> {
    let snapshot: DomSnapshot = page
        .evaluate(capture_script())
        .await
        .context("Failed to capture page")?
        .into_value()
        .context("Page capture returned an unexpected shape")?;
    tracing::debug!("Captured {} nodes at {}", snapshot.nodes.len(), snapshot.location);
    DomTree::from_snapshot(snapshot).context("Captured page is not a valid tree")
}

/// JS expression evaluating to a `DomSnapshot`-shaped object.
pub fn capture_script() -> String {
    let styles = serde_json::to_string(CAPTURED_STYLES).unwrap_or_else(|_| "[]".into());
    let vars = serde_json::to_string(BRAND_VARIABLES).unwrap_or_else(|_| "[]".into());
    format!(
        r#"(() => {{
            const STYLES = {styles};
            const VARS = {vars};
            const SKIP = new Set(['script', 'style', 'noscript', 'template', 'head']);
            const sx = window.scrollX, sy = window.scrollY;
            const nodes = [];

            function visit(el, parent) {{
                const tag = el.tagName.toLowerCase();
                if (SKIP.has(tag)) return;
                const attributes = {{}};
                for (const a of el.attributes) attributes[a.name] = a.value;
                const cs = getComputedStyle(el);
                const styles = {{}};
                for (const p of STYLES) {{
                    const v = cs.getPropertyValue(p);
                    if (v) styles[p] = v.trim();
                }}
                const r = el.getBoundingClientRect();
                let text = '';
                for (const c of el.childNodes) {{
                    if (c.nodeType === Node.TEXT_NODE) text += c.textContent;
                }}
                const index = nodes.length;
                nodes.push({{
                    tag,
                    attributes,
                    styles,
                    rect: {{ left: r.left + sx, top: r.top + sy, width: r.width, height: r.height }},
                    text: text.replace(/\s+/g, ' ').trim(),
                    parent,
                }});
                if (tag === 'svg') return;
                for (const child of el.children) visit(child, index);
            }}

            visit(document.documentElement, null);
            const root = getComputedStyle(document.documentElement);
            const rootProperties = {{}};
            for (const v of VARS) {{
                const value = root.getPropertyValue(v).trim();
                if (value) rootProperties[v] = value;
            }}
            return {{
                location: window.location.pathname + window.location.search,
                viewport: {{ width: window.innerWidth, height: window.innerHeight }},
                scroll: {{ x: sx, y: sy }},
                rootProperties,
                nodes,
            }};
        }})()"#
    )
}

//! In-page scripts evaluated through [`crate::renderer::Session::evaluate`].
//!
//! Every script is a self-invoking expression returning plain JSON. Selectors
//! and CSS are embedded as JSON string literals, so arbitrary selector text
//! cannot break out of the script.
//!
//! Keeping the scripts here (rather than inline at call sites) lets the
//! pipeline code stay focused on retry and ordering logic, and lets test
//! doubles recognise a script by comparing it with the same builder.

use crate::config::SiteSelectors;
use serde_json::Value;

/// Quote `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Lists `{url, title}` for every guide on the catalog page.
///
/// The title is the text of the first following sibling of the guide link
/// that matches `catalog_title`, falling back to a match inside the link's
/// parent. Titles are returned raw; sanitising happens in Rust.
pub fn catalog_entries(sel: &SiteSelectors) -> String {
    format!(
        r#"(() => {{
  const titleSel = {title};
  const titleOf = (link) => {{
    for (let el = link.nextElementSibling; el; el = el.nextElementSibling) {{
      if (el.matches(titleSel)) return el.innerText;
    }}
    const scoped = link.parentElement && link.parentElement.querySelector(titleSel);
    return scoped ? scoped.innerText : "";
  }};
  return [...document.querySelectorAll({link})].map(e => ({{ url: e.href, title: titleOf(e) }}));
}})()"#,
        title = js_string(&sel.catalog_title),
        link = js_string(&sel.catalog_link),
    )
}

/// Lists the absolute section URLs in table-of-contents order.
pub fn toc_links(sel: &SiteSelectors) -> String {
    format!(
        "(() => [...document.querySelectorAll({toc})].map(e => e.href))()",
        toc = js_string(&sel.toc_link),
    )
}

/// Measures the layout the page size is computed from.
///
/// Returns `{content: {height, width} | null, candidates: [{height, width}],
/// header: number | null}`; absent candidates are dropped from the list.
pub fn layout_probe(sel: &SiteSelectors) -> String {
    let candidates = Value::from(sel.fallback_candidates.clone()).to_string();
    format!(
        r#"(() => {{
  const extent = (s) => {{
    const el = document.querySelector(s);
    return el ? {{ height: el.scrollHeight, width: el.scrollWidth }} : null;
  }};
  const header = document.querySelector({header});
  return {{
    content: extent({content}),
    candidates: {candidates}.map(extent).filter(Boolean),
    header: header ? header.scrollHeight : null,
  }};
}})()"#,
        header = js_string(&sel.header),
        content = js_string(&sel.content),
        candidates = candidates,
    )
}

/// Appends a `<style>` element with `css` to the document.
pub fn inject_style(css: &str) -> String {
    format!(
        r#"(() => {{
  const s = document.createElement("style");
  s.textContent = {css};
  (document.head || document.documentElement).appendChild(s);
  return true;
}})()"#,
        css = js_string(css),
    )
}

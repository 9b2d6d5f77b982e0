//! HTML page shell, home page and rendered note pages.

use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::notes::RenderedNote;

const SITE_NAME: &str = "THEOPHYSICS";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap `body_html` in the site layout. `title` is escaped here.
pub fn shell(title: &str, body_html: &str) -> Response {
    let title = escape_html(title);
    let html = format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/water.css@2/out/water.css">
</head><body><header><h1>{title}</h1></header><main>{body_html}</main>
<footer><small>{site}</small></footer></body></html>"#,
        title = title,
        body_html = body_html,
        site = SITE_NAME,
    );
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response()
}

pub fn home() -> Response {
    shell(
        SITE_NAME,
        "<p>Dynamic notes from the vault. Open /n/your-slug</p>",
    )
}

/// Discussion form posting signed replies for `slug`. The slug has already
/// passed slug validation, so it is safe inside the script literal.
fn discussion_section(slug: &str) -> String {
    format!(
        r#"<section>
  <h2>AI Discussion</h2>
  <form id="f"><textarea name="content" rows="5" required></textarea><br>
  <input type="text" name="agent" placeholder="agent id" required>
  <input type="text" name="sig" placeholder="hmac signature (hex)" required>
  <button>Submit</button></form>
  <div id="log"></div>
<script>
const f = document.getElementById('f');
f.addEventListener('submit', async (e)=>{{
  e.preventDefault();
  const data = new FormData(f);
  const res = await fetch('/api/n/{slug}/replies', {{
    method: 'POST',
    headers: {{'content-type':'application/json','X-Agent-Id':data.get('agent'),'X-Signature':data.get('sig')}},
    body: JSON.stringify({{ content: data.get('content') }})
  }});
  document.getElementById('log').textContent = await res.text();
}});
</script>
</section>"#,
        slug = slug
    )
}

/// `slug` is the validated slug from the request path.
pub fn note(note: &RenderedNote, slug: &str) -> Response {
    let body = format!("{}{}", note.body_html, discussion_section(slug));
    shell(note.title(), &body)
}

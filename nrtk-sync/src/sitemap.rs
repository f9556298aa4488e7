//! `sitemap.xml` generation for a snapshot.

use quick_xml::escape::escape;

use nrtk_core::Article;

const LANDING_PRIORITY: &str = "1";
const ARTICLE_PRIORITY: &str = "0.8";

/// Render the sitemaps.org document listing every story.
///
/// The landing page gets priority 1, everything else 0.8.
pub fn render(landing: Option<&Article>, articles: &[&Article]) -> String {
    let mut items = String::new();
    if let Some(landing) = landing {
        items.push_str(&url_entry(landing, LANDING_PRIORITY));
    }
    for article in articles {
        items.push_str(&url_entry(article, ARTICLE_PRIORITY));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://www.sitemaps.org/schemas/sitemap/0.9 \
         http://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd\">\n\
         {items}</urlset>\n"
    )
}

fn url_entry(article: &Article, priority: &str) -> String {
    format!(
        "<url><loc>{}</loc><lastmod>{}+00:00</lastmod><priority>{priority}</priority></url>\n",
        escape(article.canonical_url.as_str()),
        escape(lastmod(&article.updated_at)),
    )
}

/// Upstream timestamps carry fractional seconds and a zone suffix; the
/// sitemap keeps `YYYY-MM-DDTHH:MM:SS` and pins it to UTC.
fn lastmod(updated_at: &str) -> &str {
    match updated_at.char_indices().nth(19) {
        Some((idx, _)) => &updated_at[..idx],
        None => updated_at,
    }
}

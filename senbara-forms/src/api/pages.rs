//! Minimal HTML pages for the authorization round trips.

use axum::response::Html;

use crate::config::SiteConfig;

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn footer(site: &SiteConfig) -> String {
    let mut links = Vec::new();
    if let Some(url) = &site.privacy_url {
        links.push(format!(r#"<a href="{}">Privacy policy</a>"#, escape(url)));
    }
    if let Some(url) = &site.imprint_url {
        links.push(format!(r#"<a href="{}">Imprint</a>"#, escape(url)));
    }

    if links.is_empty() {
        String::new()
    } else {
        format!("<footer>{}</footer>", links.join(" | "))
    }
}

fn layout(locale: &str, title: &str, head: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<title>{title} | Senbara Forms</title>
{head}
</head>
<body>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        lang = escape(locale),
        title = escape(title),
    ))
}

/// Page that immediately sends the browser on to `href`.
pub fn redirect_page(locale: &str, title: &str, href: &str, site: &SiteConfig) -> Html<String> {
    let href = escape(href);
    layout(
        locale,
        title,
        &format!(r#"<meta http-equiv="refresh" content="0; url={href}">"#),
        &format!(
            r#"<p><a href="{href}">Continue</a></p>
{footer}"#,
            footer = footer(site)
        ),
    )
}

/// Privacy policy consent prompt; submitting it posts `consent=on` to
/// `/login`.
pub fn consent_page(locale: &str, site: &SiteConfig) -> Html<String> {
    let privacy = site
        .privacy_url
        .as_deref()
        .map(|url| format!(r#" (<a href="{}" target="_blank">read it here</a>)"#, escape(url)))
        .unwrap_or_default();

    layout(
        locale,
        "Privacy policy consent",
        "",
        &format!(
            r#"<form action="/login" method="post">
<label><input type="checkbox" name="consent" required> I have read and accept the privacy policy{privacy}.</label>
<button type="submit">Continue to login</button>
</form>
{footer}"#,
            footer = footer(site)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_page_escapes_href() {
        let page = redirect_page(
            "en",
            "Signing you in ...",
            r#"/contacts?a=1&b="x""#,
            &SiteConfig::default(),
        );

        assert!(page.0.contains("url=/contacts?a=1&amp;b=&quot;x&quot;"));
        assert!(page.0.contains("<h1>Signing you in ...</h1>"));
        assert!(!page.0.contains("<footer>"));
    }

    #[test]
    fn test_consent_page_links() {
        let site = SiteConfig {
            privacy_url: Some("https://example.com/privacy".to_string()),
            imprint_url: Some("https://example.com/imprint".to_string()),
        };
        let page = consent_page("de", &site);

        assert!(page.0.contains(r#"<html lang="de">"#));
        assert!(page.0.contains(r#"name="consent""#));
        assert!(page.0.contains("https://example.com/privacy"));
        assert!(page.0.contains("https://example.com/imprint"));
    }
}

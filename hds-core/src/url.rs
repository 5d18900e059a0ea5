//! URL construction for bootstrap and fragment fetches.
//!
//! Grounded on `original_source/libavformat/hdsdec.c`'s
//! `construct_bootstrap_url`/`construct_fragment_url` and the base-url slicing
//! done at the top of `hds_read_header`. Query-string handling: the variant
//! (or bootstrap) URL's own query string wins if it has one; otherwise the
//! opener URL's query string, if any, is appended verbatim.

/// Derive the base URL: everything up to and including the final `/` of the
/// opener URL. Mirrors `av_strlcpy(c->base_url, s->url, pch - s->url + 2)`.
pub fn base_url(opener_url: &str) -> Option<String> {
    let slash = opener_url.rfind('/')?;
    Some(opener_url[..=slash].to_string())
}

fn query_of(url: &str) -> Option<&str> {
    url.find('?').map(|i| &url[i..])
}

/// Build the bootstrap fetch URL from the base, the bootstrap descriptor's
/// (possibly relative) URL, and the opener URL (for its query string).
pub fn construct_bootstrap_url(base: &str, bootstrap_url: &str, opener_url: &str) -> String {
    let mut out = String::with_capacity(base.len() + bootstrap_url.len() + 16);
    out.push_str(base);
    out.push_str(bootstrap_url);
    if query_of(bootstrap_url).is_none() {
        if let Some(q) = query_of(opener_url) {
            out.push_str(q);
        }
    }
    out
}

/// Build a fragment fetch URL: `{base}{variant_url}Seg{segment}-Frag{fragment}{query}`.
pub fn construct_fragment_url(
    base: &str,
    variant_url: &str,
    segment: u32,
    fragment: u32,
    opener_url: &str,
) -> String {
    let mut out = String::with_capacity(base.len() + variant_url.len() + 32);
    out.push_str(base);
    out.push_str(variant_url);
    out.push_str(&format!("Seg{segment}-Frag{fragment}"));
    if query_of(variant_url).is_none() {
        if let Some(q) = query_of(opener_url) {
            out.push_str(q);
        }
    }
    out
}

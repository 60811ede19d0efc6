// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::{AppError, Result};

/// Validate and canonicalise a site URL before it is stored or looked up.
///
/// Only absolute `http`/`https` URLs are accepted. Scheme and host are
/// lowercased and an empty path becomes `/`, so `http://Example.com` and
/// `http://example.com/` name the same site.
///
/// # Examples
/// ```
/// use brang::utils::url::normalize_site_url;
///
/// assert_eq!(
///     normalize_site_url("HTTP://Example.com").unwrap(),
///     "http://example.com/"
/// );
/// assert!(normalize_site_url("mailto:me@example.com").is_err());
/// ```
pub fn normalize_site_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "Unsupported URL scheme '{}' in {raw}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(AppError::validation(format!("URL has no host: {raw}")));
    }

    Ok(parsed.to_string())
}

//! Page-path rules: activation and endpoint base derivation.

use url::Url;

use crate::definition::ActivationRule;

/// The page a cascade is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub origin: Url,
    pub path: String,
}

impl PageContext {
    pub fn new(origin: Url, path: impl Into<String>) -> Self {
        Self {
            origin,
            path: path.into(),
        }
    }

    pub fn base_path(&self) -> String {
        base_path(&self.path)
    }

    /// `<base path><suffix>` resolved against the origin.
    pub fn relative_endpoint(&self, suffix: &str) -> Result<Url, url::ParseError> {
        let suffix = suffix.trim_start_matches('/');
        let mut path = format!("{}{suffix}", self.base_path());
        if !path.ends_with('/') {
            path.push('/');
        }
        self.origin.join(&path)
    }

    /// An out-of-band URL, absolute or relative to the page.
    pub fn attribute_endpoint(&self, data_url: &str) -> Result<Url, url::ParseError> {
        self.origin.join(&self.path)?.join(data_url.trim())
    }
}

/// Collection path of an admin form page.
///
/// `/ops/portal/enrollment/add/` and `/ops/portal/enrollment/15/change/` both
/// map to `/ops/portal/enrollment/`. Any other path is kept, with a trailing
/// slash added when missing.
pub fn base_path(page_path: &str) -> String {
    let trimmed = page_path.strip_suffix('/').unwrap_or(page_path);

    if let Some(head) = trimmed.strip_suffix("/add") {
        return format!("{head}/");
    }

    if let Some(rest) = trimmed.strip_suffix("/change") {
        if let Some((head, id)) = rest.rsplit_once('/') {
            if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
                return format!("{head}/");
            }
        }
    }

    if page_path.ends_with('/') {
        page_path.to_string()
    } else {
        format!("{page_path}/")
    }
}

impl ActivationRule {
    pub fn matches(&self, page_path: &str) -> bool {
        match self {
            ActivationRule::Always => true,
            ActivationRule::AddPage { model } => {
                let trimmed = page_path.strip_suffix('/').unwrap_or(page_path);
                trimmed.ends_with(&format!("/{model}/add"))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/paths_tests.rs"]
mod tests;

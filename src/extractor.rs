use url::Url;

/// Scan-derived inputs for one redemption attempt
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub code: String,
    pub dni: Option<String>,
    pub external_user_id: Option<String>,
}

impl ScanContext {
    /// Build a context from a raw scanned payload.
    ///
    /// The code follows the rules of [`extract_code`]; `dni` and
    /// `external_user_id` are picked up from query parameters when the
    /// payload is a URL, and forwarded later in the redeem body.
    pub fn from_payload(raw: &str) -> Option<Self> {
        let code = extract_code(Some(raw))?;

        let (dni, external_user_id) = match Url::parse(raw.trim()) {
            Ok(parsed) => (
                query_param(&parsed, "dni"),
                query_param(&parsed, "external_user_id"),
            ),
            Err(_) => (None, None),
        };

        Some(Self {
            code,
            dni,
            external_user_id,
        })
    }
}

/// Normalize a raw scanned payload into a coupon code.
///
/// Accepts a redemption URL, a JSON blob with a `code` field, or a bare
/// token. Returns `None` when no rule matches. Malformed URLs and malformed
/// JSON are format mismatches, not errors: they fall through to the next
/// rule instead of failing the extraction.
pub fn extract_code(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http") {
        if let Ok(parsed) = Url::parse(trimmed) {
            // An explicit `code` query parameter wins over the path
            if let Some(code) = query_param(&parsed, "code") {
                return Some(code);
            }

            let segments: Vec<&str> = parsed
                .path()
                .split('/')
                .filter(|segment| !segment.is_empty())
                .collect();

            if let Some(idx) = segments
                .iter()
                .position(|segment| segment.eq_ignore_ascii_case("qrs"))
            {
                if let Some(next) = segments.get(idx + 1) {
                    return Some((*next).to_string());
                }
            }

            if let Some(last) = segments.last() {
                if is_code(last) {
                    return Some((*last).to_string());
                }
            }
        }
    }

    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(code) = value.get("code").and_then(|code| code.as_str()) {
                if !code.is_empty() {
                    return Some(code.to_string());
                }
            }
        }
    }

    is_code(trimmed).then(|| trimmed.to_string())
}

fn query_param(parsed: &Url, name: &str) -> Option<String> {
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn is_code(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

//! Segmentation and fixup of free text typed into the URL bar.

use crate::url_bar::registry;
use url::{Host, Url};

/// Schemes with an authority section that we rebuild ourselves
const STANDARD_SCHEMES: &[&str] = &["http", "https", "ftp", "ws", "wss"];

/// Raw pieces of the typed text. Empty strings mean "not present".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    /// Scheme as typed, `None` when the user did not type one
    pub scheme: Option<String>,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

/// Split `text` into URL components.
///
/// Returns the effective scheme (lowercased, `http` when none was typed)
/// together with the components.
pub fn segment_url(text: &str) -> (String, UrlParts) {
    let text = text.trim();
    let mut parts = UrlParts::default();

    if looks_like_file_path(text) {
        parts.path = text.to_string();
        return ("file".to_string(), parts);
    }

    let rest = match find_scheme(text) {
        Some((scheme, rest)) => {
            let lower = scheme.to_ascii_lowercase();
            parts.scheme = Some(scheme.to_string());

            if lower == "file" {
                parts.path = rest.to_string();
                return (lower, parts);
            }
            if !STANDARD_SCHEMES.contains(&lower.as_str()) {
                // "site:foo", "mailto:x", "javascript:..." have no authority
                parts.path = rest.to_string();
                return (lower, parts);
            }
            rest.trim_start_matches(['/', '\\'])
        }
        None => text,
    };

    segment_authority(rest, &mut parts);
    let scheme = parts
        .scheme
        .as_deref()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "http".to_string());
    (scheme, parts)
}

fn looks_like_file_path(text: &str) -> bool {
    if text.starts_with('/') || text.starts_with("\\\\") {
        return true;
    }
    // "C:\foo" or "c:/foo"
    let bytes = text.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Find a typed scheme. "localhost:8080" is a host and port, not a scheme.
fn find_scheme(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let candidate = &text[..colon];
    // "www.example.com:/" is a host, not a scheme
    if candidate.contains('.') {
        return None;
    }
    let mut chars = candidate.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-'))
    {
        return None;
    }

    let rest = &text[colon + 1..];
    let lower = candidate.to_ascii_lowercase();
    if !STANDARD_SCHEMES.contains(&lower.as_str()) && lower != "file" {
        let port_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let port = &rest[..port_end];
        if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    Some((candidate, rest))
}

fn segment_authority(text: &str, parts: &mut UrlParts) {
    let authority_end = text.find(['/', '\\', '?', '#']).unwrap_or(text.len());
    let (authority, remainder) = text.split_at(authority_end);

    let host_port = match authority.rfind('@') {
        Some(at) => {
            let userinfo = &authority[..at];
            match userinfo.split_once(':') {
                Some((user, pass)) => {
                    parts.username = user.to_string();
                    parts.password = pass.to_string();
                }
                None => parts.username = userinfo.to_string(),
            }
            &authority[at + 1..]
        }
        None => authority,
    };

    if host_port.starts_with('[') {
        // IPv6 literal
        match host_port.find(']') {
            Some(close) => {
                parts.host = host_port[..=close].to_string();
                if let Some(port) = host_port[close + 1..].strip_prefix(':') {
                    parts.port = port.to_string();
                }
            }
            None => parts.host = host_port.to_string(),
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => {
                parts.host = host.to_string();
                parts.port = port.to_string();
            }
            None => parts.host = host_port.to_string(),
        }
    }

    let (before_fragment, fragment) = match remainder.split_once('#') {
        Some((before, fragment)) => (before, fragment),
        None => (remainder, ""),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (before_fragment, ""),
    };
    parts.path = path.to_string();
    parts.query = query.to_string();
    parts.fragment = fragment.to_string();
}

/// Turn free text into a navigable URL, assuming `http` when no scheme was
/// typed. With a `desired_tld` ("com"), a bare intranet-looking host becomes
/// `www.<host>.<tld>`.
pub fn fixup_url(text: &str, desired_tld: &str) -> Option<Url> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (scheme, parts) = segment_url(text);

    if scheme == "file" {
        if parts.scheme.is_some() {
            return Url::parse(text).ok();
        }
        let path = text.replace('\\', "/");
        let url_text = if path.starts_with('/') {
            format!("file://{}", path)
        } else {
            format!("file:///{}", path)
        };
        return Url::parse(&url_text).ok();
    }

    if parts.scheme.is_some() && !STANDARD_SCHEMES.contains(&scheme.as_str()) {
        return Url::parse(text).ok();
    }

    if parts.host.is_empty() {
        return None;
    }

    let mut url_text = format!("{}://", scheme);
    if !parts.username.is_empty() || !parts.password.is_empty() {
        url_text.push_str(&parts.username);
        if !parts.password.is_empty() {
            url_text.push(':');
            url_text.push_str(&parts.password);
        }
        url_text.push('@');
    }
    url_text.push_str(&add_desired_tld(&parts.host, desired_tld));
    if !parts.port.is_empty() {
        url_text.push(':');
        url_text.push_str(&parts.port);
    }
    url_text.push_str(&parts.path);
    if !parts.query.is_empty() {
        url_text.push('?');
        url_text.push_str(&parts.query);
    }
    if !parts.fragment.is_empty() {
        url_text.push('#');
        url_text.push_str(&parts.fragment);
    }

    Url::parse(&url_text).ok()
}

fn add_desired_tld(host: &str, desired_tld: &str) -> String {
    if desired_tld.is_empty()
        || host.ends_with('.')
        || registry::ipv4_component_count(host).is_some()
        || registry::registry_length(host) != Some(0)
    {
        return host.to_string();
    }

    let with_www = if host.to_ascii_lowercase().starts_with("www.") {
        host.to_string()
    } else {
        format!("www.{}", host)
    };
    format!("{}.{}", with_www, desired_tld)
}

/// Whether `text` begins with an explicit `http:` scheme
pub fn has_http_scheme(text: &str) -> bool {
    text.trim_start()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http:"))
}

/// Remove a leading "http://" (or "http:") from `text`, returning how many
/// bytes were removed.
pub fn trim_http_prefix(text: &mut String) -> usize {
    if !has_http_scheme(text) {
        return 0;
    }
    let leading = text.len() - text.trim_start().len();
    let after_scheme = leading + 5;
    let slashes = text[after_scheme..]
        .chars()
        .take_while(|c| *c == '/' || *c == '\\')
        .count()
        .min(2);
    let removed = after_scheme + slashes;
    text.drain(..removed);
    removed
}

/// Normalize what the user typed for prefix matching against history:
/// canonicalize, but keep the user's scheme choice and trailing slashes.
pub fn fixup_user_input(text: &str) -> String {
    let Some(url) = fixup_url(text, "") else {
        return String::new();
    };
    let mut output = url.to_string();

    // The canonicalizer turns "17173" into "0.0.67.21"; put the typed host back
    // unless it really was a full dotted quad.
    if let Some(Host::Ipv4(_)) = url.host() {
        let (_, parts) = segment_url(text);
        if registry::ipv4_component_count(&parts.host) != Some(4) {
            if let Some(canonical) = url.host_str() {
                output = output.replacen(canonical, &parts.host.to_ascii_lowercase(), 1);
            }
        }
    }

    if !has_http_scheme(text) {
        trim_http_prefix(&mut output);
    }

    let input_slashes = trailing_slashes(text);
    let output_slashes = trailing_slashes(&output);
    if output_slashes < input_slashes {
        output.extend(std::iter::repeat('/').take(input_slashes - output_slashes));
    } else if output_slashes > input_slashes {
        output.truncate(output.len() - (output_slashes - input_slashes));
    }

    output
}

fn trailing_slashes(text: &str) -> usize {
    text.chars()
        .rev()
        .take_while(|c| *c == '/' || *c == '\\')
        .count()
}

/// A URL with nothing after the host: no path beyond "/", no query, no ref
pub fn is_host_only(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            (parsed.path().is_empty() || parsed.path() == "/")
                && parsed.query().is_none()
                && parsed.fragment().is_none()
        }
        Err(_) => false,
    }
}

/// "scheme://host[:port]/" for URLs with an authority, except file URLs
pub fn host_only_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !STANDARD_SCHEMES.contains(&parsed.scheme()) {
        return None;
    }
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_plain_host() {
        let (scheme, parts) = segment_url("google.com/search?q=a#top");
        assert_eq!(scheme, "http");
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.host, "google.com");
        assert_eq!(parts.path, "/search");
        assert_eq!(parts.query, "q=a");
        assert_eq!(parts.fragment, "top");
    }

    #[test]
    fn test_segment_credentials_and_port() {
        let (scheme, parts) = segment_url("https://user:pw@example.com:8443/x");
        assert_eq!(scheme, "https");
        assert_eq!(parts.username, "user");
        assert_eq!(parts.password, "pw");
        assert_eq!(parts.host, "example.com");
        assert_eq!(parts.port, "8443");
        assert_eq!(parts.path, "/x");
    }

    #[test]
    fn test_segment_host_port_is_not_scheme() {
        let (scheme, parts) = segment_url("localhost:8080/app");
        assert_eq!(scheme, "http");
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.host, "localhost");
        assert_eq!(parts.port, "8080");
    }

    #[test]
    fn test_segment_unknown_scheme() {
        let (scheme, parts) = segment_url("site:rust-lang.org");
        assert_eq!(scheme, "site");
        assert!(parts.host.is_empty());
        assert_eq!(parts.path, "rust-lang.org");
    }

    #[test]
    fn test_segment_file_path() {
        assert_eq!(segment_url("/etc/hosts").0, "file");
        assert_eq!(segment_url("C:\\Windows").0, "file");
    }

    #[test]
    fn test_fixup_url() {
        assert_eq!(fixup_url("Example.com", "").unwrap().as_str(), "http://example.com/");
        assert_eq!(fixup_url("google", "com").unwrap().as_str(), "http://www.google.com/");
        assert_eq!(fixup_url("www.intranet", "com").unwrap().as_str(), "http://www.intranet.com/");
        assert_eq!(fixup_url("/tmp/a b", "").unwrap().as_str(), "file:///tmp/a%20b");
        assert_eq!(fixup_url("about:blank", "").unwrap().as_str(), "about:blank");
        assert!(fixup_url("   ", "").is_none());
    }

    #[test]
    fn test_fixup_user_input_keeps_what_was_typed() {
        assert_eq!(fixup_user_input("kernel"), "kernel");
        assert_eq!(fixup_user_input("Slash"), "slash");
        assert_eq!(fixup_user_input("http://redirects/"), "http://redirects/");
        assert_eq!(fixup_user_input("foo.com//"), "foo.com//");
        assert_eq!(fixup_user_input("17173"), "17173");
    }

    #[test]
    fn test_trim_http_prefix() {
        let mut text = "http://example.com/".to_string();
        assert_eq!(trim_http_prefix(&mut text), 7);
        assert_eq!(text, "example.com/");

        let mut text = "https://example.com/".to_string();
        assert_eq!(trim_http_prefix(&mut text), 0);
    }

    #[test]
    fn test_host_only() {
        assert!(is_host_only("http://slashdot.org/"));
        assert!(!is_host_only("http://slashdot.org/favorite_page.html"));
        assert!(!is_host_only("http://slashdot.org/?q=1"));
        assert_eq!(
            host_only_url("http://slashdot.org:81/favorite_page.html").as_deref(),
            Some("http://slashdot.org:81/")
        );
        assert_eq!(host_only_url("file:///etc/hosts"), None);
    }
}

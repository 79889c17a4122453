//! Registry ("public suffix") lookups for hosts typed into the URL bar.

use url::Host;

/// Length of the registry portion of `host`, from the public suffix list.
///
/// Returns `Some(0)` for hosts without a listed registry (intranet names,
/// IP literals, a bare registry) and `None` when the host cannot be
/// canonicalized at all.
pub fn registry_length(host: &str) -> Option<usize> {
    let canonical = match Host::parse(host) {
        Ok(Host::Domain(domain)) => domain,
        Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_)) => return Some(0),
        Err(_) => return None,
    };

    let domain = canonical.strip_suffix('.').unwrap_or(&canonical);
    let Some(suffix) = psl::suffix(domain.as_bytes()) else {
        return Some(0);
    };

    let length = suffix.as_bytes().len();
    // unlisted TLDs only match the list's catch-all rule
    if !suffix.is_known() || length >= domain.len() {
        return Some(0);
    }
    Some(length)
}

/// Number of dotted numeric components if `host` looks like an IPv4
/// literal ("10", "10.1", "0x7f.0.0.1", ...), otherwise `None`.
pub fn ipv4_component_count(host: &str) -> Option<usize> {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() {
        return None;
    }

    let mut count = 0;
    for component in host.split('.') {
        let numeric = if let Some(hex) = component
            .strip_prefix("0x")
            .or_else(|| component.strip_prefix("0X"))
        {
            hex.chars().all(|c| c.is_ascii_hexdigit())
        } else {
            !component.is_empty() && component.chars().all(|c| c.is_ascii_digit())
        };
        if !numeric {
            return None;
        }
        count += 1;
    }

    (count <= 4).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_registry() {
        assert_eq!(registry_length("google.com"), Some(3));
        assert_eq!(registry_length("WWW.Example.CO.UK"), Some(5));
        assert_eq!(registry_length("example.com."), Some(3));
        assert_eq!(registry_length("yandex.by"), Some(2));
        assert_eq!(registry_length("example.museum"), Some(6));
        assert_eq!(registry_length("bbc.travel"), Some(6));
    }

    #[test]
    fn test_unknown_registry() {
        assert_eq!(registry_length("localhost"), Some(0));
        assert_eq!(registry_length("foo.invalidtld"), Some(0));
        assert_eq!(registry_length("com"), Some(0));
        assert_eq!(registry_length("co.uk"), Some(0));
        assert_eq!(registry_length("192.168.0.1"), Some(0));
    }

    #[test]
    fn test_uncanonicalizable() {
        assert_eq!(registry_length("foo bar"), None);
        assert_eq!(registry_length("a<b"), None);
    }

    #[test]
    fn test_ipv4_components() {
        assert_eq!(ipv4_component_count("192.168.0.1"), Some(4));
        assert_eq!(ipv4_component_count("1.2"), Some(2));
        assert_eq!(ipv4_component_count("0x7f.1"), Some(2));
        assert_eq!(ipv4_component_count("1.2.3.4.5"), None);
        assert_eq!(ipv4_component_count("1.a"), None);
        assert_eq!(ipv4_component_count("1..2"), None);
    }
}

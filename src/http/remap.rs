use std::borrow::Cow;
use std::fmt::{self, Display};
use std::str::FromStr;

/// A single `--maphost` rule: connections to `source` dial `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMapping {
    /// Exact `host:port` the transport is about to dial.
    source: String,
    /// Substitute host, IPv6 literals kept bracketed.
    dst_host: String,
    /// Substitute port; `None` inherits the source port.
    dst_port: Option<u16>,
    /// `destination` with the port resolved, computed once at parse time.
    resolved: String,
}

impl HostMapping {
    pub fn new(source: &str, destination: &str) -> Result<Self, String> {
        let (_, src_port, rest) = split_host_port(source)?;
        if !rest.is_empty() {
            return Err(format!("unexpected trailing `{rest}` in source `{source}`"));
        }
        let src_port = src_port.ok_or_else(|| format!("source `{source}` has no port"))?;
        let (dst_host, dst_port) = parse_destination(destination)?;

        let resolved = format!("{dst_host}:{}", dst_port.unwrap_or(src_port));
        Ok(Self {
            source: source.to_string(),
            dst_host,
            dst_port,
            resolved,
        })
    }

    pub fn matches(&self, addr: &str) -> bool {
        self.source == addr
    }

    /// Destination to dial, with the source port filled in when none was given.
    pub fn destination(&self) -> &str {
        &self.resolved
    }
}

impl FromStr for HostMapping {
    type Err = String;

    /// Parses `host:port:dest[:dstport]`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        const EXPECTED: &str = "expected <host:port:addr[:dstport]>";

        let (_, port, rest) = split_host_port(value)?;
        if port.is_none() {
            return Err(EXPECTED.into());
        }
        let destination = rest.strip_prefix(':').ok_or_else(|| EXPECTED.to_string())?;
        let source = &value[..value.len() - rest.len()];
        Self::new(source, destination)
    }
}

impl Display for HostMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dst_port {
            Some(port) => write!(f, "{} -> {}:{port}", self.source, self.dst_host),
            None => write!(f, "{} -> {}", self.source, self.dst_host),
        }
    }
}

/// Ordered, immutable list of host mappings. First match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMap {
    rules: Vec<HostMapping>,
}

impl HostMap {
    pub fn new(rules: Vec<HostMapping>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[HostMapping] {
        &self.rules
    }

    /// Returns the address to dial instead of `addr`, or `addr` itself when no
    /// rule matches.
    pub fn remap<'a>(&'a self, addr: &'a str) -> Cow<'a, str> {
        match self.rules.iter().find(|rule| rule.matches(addr)) {
            Some(rule) => Cow::Borrowed(rule.destination()),
            None => Cow::Borrowed(addr),
        }
    }
}

/// Splits `host[:port]` off the front of `input`, returning whatever follows
/// the port. Bracketed IPv6 hosts keep their brackets.
fn split_host_port(input: &str) -> Result<(&str, Option<u16>, &str), String> {
    let (host, after_host) = if input.starts_with('[') {
        let end = input
            .find(']')
            .ok_or_else(|| format!("unterminated IPv6 literal in `{input}`"))?;
        input.split_at(end + 1)
    } else {
        match input.find(':') {
            Some(idx) => input.split_at(idx),
            None => (input, ""),
        }
    };
    if host.is_empty() || host == "[]" {
        return Err(format!("missing host in `{input}`"));
    }

    let Some(after_colon) = after_host.strip_prefix(':') else {
        if after_host.is_empty() {
            return Ok((host, None, ""));
        }
        return Err(format!("unexpected `{after_host}` after host `{host}`"));
    };

    let (port, rest) = match after_colon.find(':') {
        Some(idx) => after_colon.split_at(idx),
        None => (after_colon, ""),
    };
    Ok((host, Some(parse_port(port)?), rest))
}

fn parse_destination(destination: &str) -> Result<(String, Option<u16>), String> {
    if !destination.starts_with('[') && destination.matches(':').count() > 1 {
        return Err(format!(
            "IPv6 destination `{destination}` must be enclosed in brackets"
        ));
    }
    let (host, port, rest) = split_host_port(destination)?;
    if !rest.is_empty() {
        return Err(format!("unexpected trailing `{rest}` in destination `{destination}`"));
    }
    Ok((host.to_string(), port))
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>().map_err(|_| format!("invalid port `{port}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(rules: &[&str]) -> HostMap {
        HostMap::new(rules.iter().map(|r| r.parse().unwrap()).collect())
    }

    #[test]
    fn destination_without_port_inherits_source_port() {
        let hosts = map(&["example.com:443:10.0.0.1"]);
        assert_eq!(hosts.remap("example.com:443"), "10.0.0.1:443");
    }

    #[test]
    fn destination_with_port_is_used_as_is() {
        let hosts = map(&["example.com:80:127.0.0.1:8080"]);
        assert_eq!(hosts.remap("example.com:80"), "127.0.0.1:8080");
    }

    #[test]
    fn unmatched_address_is_unchanged() {
        let hosts = map(&["example.com:80:127.0.0.1"]);
        assert_eq!(hosts.remap("example.com:443"), "example.com:443");
        assert_eq!(hosts.remap("other.org:80"), "other.org:80");
        assert_eq!(HostMap::default().remap("a:1"), "a:1");
    }

    #[test]
    fn match_is_exact_and_case_sensitive() {
        let hosts = map(&["example.com:80:127.0.0.1"]);
        assert_eq!(hosts.remap("EXAMPLE.com:80"), "EXAMPLE.com:80");
        assert_eq!(hosts.remap("www.example.com:80"), "www.example.com:80");
    }

    #[test]
    fn first_matching_rule_wins() {
        let hosts = map(&[
            "api.test:443:10.0.0.1",
            "api.test:443:10.0.0.2:8443",
        ]);
        assert_eq!(hosts.remap("api.test:443"), "10.0.0.1:443");
    }

    #[test]
    fn bracketed_ipv6_is_supported_on_both_sides() {
        let hosts = map(&["[::1]:8080:[fe80::2]", "v6.test:443:[2001:db8::1]:9443"]);
        assert_eq!(hosts.remap("[::1]:8080"), "[fe80::2]:8080");
        assert_eq!(hosts.remap("v6.test:443"), "[2001:db8::1]:9443");
    }

    #[test]
    fn unbracketed_ipv6_destination_is_rejected() {
        let err = "v6.test:443:2001:db8::1".parse::<HostMapping>().unwrap_err();
        assert!(err.contains("brackets"), "{err}");
    }

    #[test]
    fn malformed_rules_are_rejected() {
        for value in [
            "example.com",
            "example.com:80",
            "example.com:http:127.0.0.1",
            ":80:127.0.0.1",
            "example.com:80:",
            "example.com:80:127.0.0.1:port",
            "example.com:80:127.0.0.1:80:90",
            "[::1:80:127.0.0.1",
        ] {
            assert!(value.parse::<HostMapping>().is_err(), "accepted `{value}`");
        }
    }

    #[test]
    fn source_is_matched_literally() {
        let hosts = map(&["a.test:0080:10.0.0.1"]);
        assert_eq!(hosts.remap("a.test:80"), "a.test:80");
        assert_eq!(hosts.remap("a.test:0080"), "10.0.0.1:80");
    }

    #[test]
    fn display_shows_rule() {
        let rule: HostMapping = "a.test:80:b.test".parse().unwrap();
        assert_eq!(rule.to_string(), "a.test:80 -> b.test");
        assert_eq!(rule.destination(), "b.test:80");
    }
}

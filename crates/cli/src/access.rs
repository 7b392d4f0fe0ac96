//! Host and Origin checks for the attach routes.
//!
//! A debugger connection can run arbitrary code in the debuggee, and the
//! launch route can start an arbitrary program. Browsers let any page open a
//! WebSocket to a loopback port, so upgrades are refused unless:
//!
//! - `Host` names an IP address, `localhost`, or the advertised public host
//!   (blocks DNS rebinding);
//! - `Origin` is absent (non-browser clients), a loopback page, a `devtools:`
//!   page, or listed with `--allow-origin`.

use axum::http::HeaderMap;
use axum::http::header::{HOST, ORIGIN};
use url::{Host, Url};

use crate::config::BridgeConfig;

/// Checks the request headers of an attach upgrade.
///
/// Returns the offending header value on refusal.
pub fn check(headers: &HeaderMap, config: &BridgeConfig) -> Result<(), String> {
	if let Some(host) = headers.get(HOST) {
		let host = host.to_str().map_err(|_| "Host: <non-ascii>".to_string())?;
		if !host_allowed(host, config.public_host.as_deref()) {
			return Err(format!("Host: {host}"));
		}
	}
	if let Some(origin) = headers.get(ORIGIN) {
		let origin = origin.to_str().map_err(|_| "Origin: <non-ascii>".to_string())?;
		if !origin_allowed(origin, &config.allowed_origins) {
			return Err(format!("Origin: {origin}"));
		}
	}
	Ok(())
}

fn host_allowed(host: &str, public_host: Option<&str>) -> bool {
	let Some(name) = host_name(host) else {
		return false;
	};
	match name {
		Host::Ipv4(_) | Host::Ipv6(_) => true,
		Host::Domain(domain) => {
			domain.eq_ignore_ascii_case("localhost")
				|| public_host
					.and_then(host_name)
					.is_some_and(|public| matches!(public, Host::Domain(p) if p.eq_ignore_ascii_case(&domain)))
		}
	}
}

/// Host part of a `host[:port]` authority.
fn host_name(authority: &str) -> Option<Host<String>> {
	Url::parse(&format!("http://{authority}"))
		.ok()
		.and_then(|url| url.host().map(|host| host.to_owned()))
}

fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
	if allowed.iter().any(|a| a == "*" || a.eq_ignore_ascii_case(origin)) {
		return true;
	}
	let Ok(url) = Url::parse(origin) else {
		return false;
	};
	match url.scheme() {
		"devtools" => true,
		"http" | "https" => match url.host() {
			Some(Host::Ipv4(ip)) => ip.is_loopback(),
			Some(Host::Ipv6(ip)) => ip.is_loopback(),
			Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
			None => false,
		},
		_ => false,
	}
}

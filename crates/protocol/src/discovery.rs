//! Discovery endpoint payloads.
//!
//! These mirror the inspector HTTP protocol spoken by debugger front-ends:
//! `/json/version` answers with [`VersionInfo`] and `/json/list` with an array
//! of [`DiscoveryRecord`]. Field names are fixed by the front-end and must not
//! drift, so every response goes through these structs.

use serde::{Deserialize, Serialize};

/// Front-end URL prefix; the attach endpoint is appended after `ws=`.
pub const FRONTEND_URL_PREFIX: &str =
	"chrome-devtools://devtools/bundled/inspector.html?experiments=true&v8only=true&ws=";

/// Body of the version query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
	/// Product name and version, e.g. `node.js/v9.11.1`.
	#[serde(rename = "Browser")]
	pub browser: String,
	/// Debug protocol version, e.g. `1.1`.
	#[serde(rename = "Protocol-Version")]
	pub protocol_version: String,
}

/// One attachable target as listed by the discovery endpoint.
///
/// Field order matches the serialized order front-ends are used to seeing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
	pub description: String,
	pub devtools_frontend_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub favicon_url: Option<String>,
	pub id: String,
	pub title: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub url: String,
	pub web_socket_debugger_url: String,
}

impl DiscoveryRecord {
	/// Builds the record a front-end sees for `target`.
	///
	/// `attach_endpoint` is the bridge-side endpoint without scheme, such as
	/// `localhost:9300/devtools/page/abc`. The target's own backend address is
	/// never exposed; front-ends always attach through the bridge.
	pub fn from_target(target: &TargetDescriptor, attach_endpoint: &str) -> Self {
		Self {
			description: target.description.clone(),
			devtools_frontend_url: format!("{FRONTEND_URL_PREFIX}{attach_endpoint}"),
			favicon_url: target.favicon_url.clone(),
			id: target.id.clone(),
			title: target.title.clone(),
			kind: target.kind.clone(),
			url: target.url.clone(),
			web_socket_debugger_url: format!("ws://{attach_endpoint}"),
		}
	}
}

/// Registry form of an attachable target.
///
/// Loaded from the `--targets` file or registered for launched processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
	pub id: String,
	pub title: String,
	#[serde(rename = "type", default = "default_kind")]
	pub kind: String,
	/// Source URL of the debuggee (script or page).
	#[serde(default)]
	pub url: String,
	/// Debuggee's own debug endpoint, e.g. `ws://127.0.0.1:9229/abc`.
	pub backend: String,
	#[serde(default)]
	pub favicon_url: Option<String>,
	#[serde(default)]
	pub description: String,
}

fn default_kind() -> String {
	"node".to_string()
}

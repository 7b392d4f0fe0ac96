//! Version and list queries.
//!
//! Read-only views over the registry. Records always point front-ends at the
//! bridge's own attach endpoints, never at a backend directly.

use std::path::Path;

use axum::Json;
use axum::extract::State;
use bridge_protocol::{DiscoveryRecord, TargetDescriptor, VersionInfo};
use bridge_runtime::SessionId;
use tracing::debug;

use crate::server::AppState;

/// Direct-attach route prefix; the page id follows.
pub const PAGE_PATH: &str = "/devtools/page/";

/// Launch-attach route.
pub const LAUNCH_PATH: &str = "/launch-and-connect";

/// Id of the record advertising the configured app.
pub const LAUNCH_TARGET_ID: &str = "launch-and-connect";

const NODE_DESCRIPTION: &str = "node.js instance";
const NODE_FAVICON: &str = "https://nodejs.org/static/favicon.ico";

pub async fn version(State(state): State<AppState>) -> Json<VersionInfo> {
	debug!(target = "dbgbridge.discovery", "version query");
	Json(state.config.version.clone())
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<DiscoveryRecord>> {
	let records = records(&state.registry.list(), state.config.app.as_deref(), &state.advertised);
	debug!(target = "dbgbridge.discovery", count = records.len(), "list query");
	Json(records)
}

/// Builds the list response: registered targets in id order, then the
/// configured app (if any) pointing at the launch endpoint.
pub fn records(targets: &[TargetDescriptor], app: Option<&Path>, advertised: &str) -> Vec<DiscoveryRecord> {
	let mut records: Vec<DiscoveryRecord> = targets
		.iter()
		.map(|target| DiscoveryRecord::from_target(target, &format!("{advertised}{PAGE_PATH}{}", target.id)))
		.collect();

	if let Some(app) = app {
		let target = app_target(LAUNCH_TARGET_ID.to_string(), app, String::new());
		records.push(DiscoveryRecord::from_target(&target, &format!("{advertised}{LAUNCH_PATH}")));
	}
	records
}

/// Registry entry for a launched debuggee, keyed by its session.
pub fn launched_target(session: SessionId, app: &Path, backend: &str) -> TargetDescriptor {
	app_target(session.to_string(), app, backend.to_string())
}

fn app_target(id: String, app: &Path, backend: String) -> TargetDescriptor {
	let title = app
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| app.display().to_string());
	TargetDescriptor {
		id,
		title,
		kind: "node".to_string(),
		url: file_url(app),
		backend,
		favicon_url: Some(NODE_FAVICON.to_string()),
		description: NODE_DESCRIPTION.to_string(),
	}
}

fn file_url(path: &Path) -> String {
	std::path::absolute(path)
		.ok()
		.and_then(|abs| url::Url::from_file_path(abs).ok())
		.map(String::from)
		.unwrap_or_else(|| path.display().to_string())
}

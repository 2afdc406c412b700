//! End-to-end tests driving the `forge-session` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

struct Workspace {
	dir: TempDir,
}

impl Workspace {
	fn new() -> Self {
		Self {
			dir: TempDir::new().unwrap(),
		}
	}

	fn path(&self, name: &str) -> PathBuf {
		self.dir.path().join(name)
	}

	fn store(&self) -> PathBuf {
		self.path("sessions.json")
	}

	/// Runs the binary against an isolated store and an unreachable registrar.
	fn run(&self, args: &[&str]) -> (i32, serde_json::Value, String) {
		self.run_against("http://127.0.0.1:1", args)
	}

	fn run_against(&self, registrar: &str, args: &[&str]) -> (i32, serde_json::Value, String) {
		let output = Command::new(env!("CARGO_BIN_EXE_forge-session"))
			.env("XDG_CONFIG_HOME", self.path("config"))
			.env("XDG_CACHE_HOME", self.path("cache"))
			.env_remove("FORGE_REGISTRAR_URL")
			.env_remove("FORGE_CHAIN_ID")
			.env_remove("FORGE_SESSION_VERSION")
			.env_remove("FORGE_APP_DOMAIN")
			.env_remove("FORGE_SESSION_EXPIRY_DAYS")
			.env_remove("FORGE_REQUEST_TIMEOUT_SECS")
			.env_remove("RUST_LOG")
			.arg("--store")
			.arg(self.store())
			.args(["--registrar", registrar])
			.args(["-f", "ndjson"])
			.args(args)
			.output()
			.expect("failed to execute forge-session");

		let stdout = String::from_utf8_lossy(&output.stdout).to_string();
		let stderr = String::from_utf8_lossy(&output.stderr).to_string();
		let json = serde_json::from_str(stdout.trim()).unwrap_or_else(|_| serde_json::json!({ "raw": stdout }));
		(output.status.code().unwrap_or(-1), json, stderr)
	}

	fn keygen(&self) -> (PathBuf, String) {
		let key = self.path("wallet.key");
		let (code, json, stderr) = self.run(&["keygen", "--out", key.to_str().unwrap()]);
		assert_eq!(code, 0, "keygen failed: {stderr}");
		let public_key = json["data"]["publicKey"].as_str().unwrap().to_string();
		(key, public_key)
	}
}

fn arg(path: &Path) -> &str {
	path.to_str().unwrap()
}

#[test]
fn keygen_refuses_to_overwrite() {
	let ws = Workspace::new();
	let (key, public_key) = ws.keygen();
	assert!(public_key.len() >= 32);

	let (code, json, _) = ws.run(&["keygen", "--out", arg(&key)]);
	assert_eq!(code, 1);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");

	let (code, json, _) = ws.run(&["keygen", "--out", arg(&key), "--force"]);
	assert_eq!(code, 0);
	assert_ne!(json["data"]["publicKey"], public_key.as_str());
}

#[test]
fn intent_renders_signed_request_offline() {
	let ws = Workspace::new();
	let (key, public_key) = ws.keygen();

	let (code, json, stderr) = ws.run(&[
		"intent",
		"--key",
		arg(&key),
		"--domain",
		"https://app.forge.example",
		"--expires-in-days",
		"2",
		"--token",
		"MintA:500",
	]);
	assert_eq!(code, 0, "intent failed: {stderr}");

	let request = &json["data"];
	assert_eq!(request["public_key"], public_key.as_str());
	assert_eq!(request["chain_id"], "fogo-testnet");
	assert_eq!(request["domain"], "https://app.forge.example");
	let message = request["intent_message"].as_str().unwrap();
	assert!(message.starts_with("Fogo Sessions:\n"));
	assert!(message.contains("\ndomain: https://app.forge.example\n"));
	assert!(message.contains(&format!("\nsession_key: {}\n", request["session_key"].as_str().unwrap())));
	assert!(message.ends_with("tokens:\n- MintA (limit: 500)"));
	assert!(!request["signature"].as_str().unwrap().is_empty());
	assert!(!ws.store().exists());
}

#[test]
fn unreachable_registrar_fails_without_caching() {
	let ws = Workspace::new();
	let (key, _) = ws.keygen();

	let (code, json, _) = ws.run(&["create", "--key", arg(&key)]);
	assert_eq!(code, 1);
	assert_eq!(json["ok"], false);
	assert_eq!(json["command"], "create");
	assert_eq!(json["error"]["code"], "REGISTRATION_FAILED");
	assert_eq!(json["error"]["details"]["kind"], "network");

	let (code, json, _) = ws.run(&["list"]);
	assert_eq!(code, 0);
	assert_eq!(json["data"]["count"], 0);
}

#[test]
fn simulated_session_lifecycle() {
	let ws = Workspace::new();
	let (key, public_key) = ws.keygen();

	let (code, json, stderr) = ws.run(&["create", "--key", arg(&key), "--simulate-on-failure"]);
	assert_eq!(code, 0, "create failed: {stderr}");
	assert_eq!(json["data"]["simulated"], true);
	assert_eq!(json["data"]["owner"], public_key.as_str());
	assert_eq!(json["diagnostics"][0]["level"], "warning");

	let (_, json, _) = ws.run(&["show", "--owner", &public_key]);
	assert_eq!(json["ok"], true);
	assert_eq!(json["data"]["chainId"], "fogo-testnet");
	assert!(json["data"]["remainingSecs"].as_i64().unwrap() > 6 * 24 * 3600);

	let (_, json, _) = ws.run(&["list"]);
	assert_eq!(json["data"]["count"], 1);

	let (_, json, _) = ws.run(&["revoke", "--key", arg(&key)]);
	assert_eq!(json["data"]["revoked"], true);

	let (code, json, _) = ws.run(&["show", "--key", arg(&key)]);
	assert_eq!(code, 1);
	assert_eq!(json["error"]["code"], "NO_ACTIVE_SESSION");
	assert_eq!(json["error"]["details"]["owner"], public_key.as_str());
}

#[test]
fn missing_key_file_is_wallet_not_found() {
	let ws = Workspace::new();
	let missing = ws.path("nope.key");
	let (code, json, _) = ws.run(&["create", "--key", arg(&missing)]);
	assert_eq!(code, 1);
	assert_eq!(json["error"]["code"], "WALLET_NOT_FOUND");
}

#[test]
fn non_http_registrar_is_invalid_input() {
	let ws = Workspace::new();
	let (code, json, _) = ws.run_against("ftp://registrar.example", &["list"]);
	assert_eq!(code, 1);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[test]
fn prune_on_empty_store() {
	let ws = Workspace::new();
	let (code, json, _) = ws.run(&["prune"]);
	assert_eq!(code, 0);
	assert_eq!(json["data"]["removed"], 0);
	assert_eq!(json["data"]["remaining"], 0);
}

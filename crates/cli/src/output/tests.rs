use chrono::{Duration, TimeZone};

use super::*;

fn record() -> SessionRecord {
	let created_at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
	SessionRecord {
		session_id: "abc".into(),
		session_key: "6f1c2f0e-58a8-4c55-9d8c-0c4f4f3a0b11".parse().unwrap(),
		owner: forge_session::PublicKey::new([7; 32]),
		domain: "https://app.forge.example".into(),
		chain_id: "fogo-testnet".into(),
		expires_at: created_at + Duration::days(7),
		created_at,
		simulated: false,
	}
}

#[test]
fn result_builder_success() {
	let result: CommandResult<KeygenData> = ResultBuilder::new("keygen")
		.data(KeygenData {
			public_key: "11111111111111111111111111111111".into(),
			path: "/tmp/wallet.key".into(),
		})
		.build();

	assert!(result.ok);
	assert_eq!(result.command, "keygen");
	assert_eq!(result.schema_version, Some(SCHEMA_VERSION));
	assert!(result.error.is_none());
}

#[test]
fn result_builder_error() {
	let result: CommandResult<SessionData> = ResultBuilder::new("show")
		.error(ErrorCode::NoActiveSession, "no active session")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::NoActiveSession);
}

#[test]
fn error_code_display_matches_serde() {
	for code in [
		ErrorCode::RegistrationFailed,
		ErrorCode::SessionExpired,
		ErrorCode::UserRejected,
		ErrorCode::WalletNotFound,
	] {
		let serialized = serde_json::to_value(code).unwrap();
		assert_eq!(serialized, code.to_string());
	}
}

#[test]
fn output_format_parse() {
	assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
	assert_eq!("NDJSON".parse::<OutputFormat>().unwrap(), OutputFormat::Ndjson);
	assert!("toon".parse::<OutputFormat>().is_err());
}

#[test]
fn session_data_flattens_record() {
	let record = record();
	let now = record.created_at + Duration::hours(1);
	let data = SessionData::new(record, now);
	let json = serde_json::to_value(&data).unwrap();

	assert_eq!(json["sessionId"], "abc");
	assert_eq!(json["chainId"], "fogo-testnet");
	assert_eq!(json["remainingSecs"], (Duration::days(7) - Duration::hours(1)).num_seconds());
	assert!(json.get("simulated").is_none());
}

#[test]
fn diagnostics_included() {
	let result: CommandResult<PruneData> = ResultBuilder::new("prune")
		.data(PruneData {
			removed: 2,
			remaining: 1,
		})
		.diagnostic(DiagnosticLevel::Info, "pruned 2 expired sessions")
		.build();

	let json = serde_json::to_string(&result).unwrap();
	assert!(json.contains("\"ok\":true"));
	assert!(json.contains("\"level\":\"info\""));
}

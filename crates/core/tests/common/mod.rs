//! In-process registrar for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use forge_session::protocol::CreateSessionRequest;
use forge_session::{PublicKey, Signature};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// How the server answers the next requests.
#[derive(Debug, Clone)]
pub enum Reply {
	/// `{"success":true,"session_id":..}` echoing the request's expiry and keys.
	Accept { session_id: String },
	Status(u16, String),
	Body(String),
	Hang(Duration),
}

#[derive(Debug, Clone)]
pub struct Received {
	pub request: CreateSessionRequest,
	pub signature_valid: bool,
}

#[derive(Clone)]
struct ServerState {
	reply: Arc<Mutex<Reply>>,
	received: Arc<Mutex<Vec<Received>>>,
}

pub struct TestServer {
	addr: SocketAddr,
	state: ServerState,
	handle: JoinHandle<()>,
}

impl TestServer {
	pub async fn start() -> Self {
		let state = ServerState {
			reply: Arc::new(Mutex::new(Reply::Accept {
				session_id: "abc".into(),
			})),
			received: Arc::new(Mutex::new(Vec::new())),
		};
		let app = Router::new()
			.route("/api/sessions/create", post(create_session))
			.with_state(state.clone());

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let handle = tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		Self { addr, state, handle }
	}

	pub fn base_url(&self) -> String {
		format!("http://{}/api", self.addr)
	}

	pub fn reply_with(&self, reply: Reply) {
		*self.state.reply.lock() = reply;
	}

	pub fn received(&self) -> Vec<Received> {
		self.state.received.lock().clone()
	}
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

fn verify(request: &CreateSessionRequest) -> bool {
	let Ok(owner) = request.public_key.parse::<PublicKey>() else {
		return false;
	};
	let Ok(signature) = Signature::from_base64(&request.signature) else {
		return false;
	};
	let Ok(key) = VerifyingKey::from_bytes(owner.as_bytes()) else {
		return false;
	};
	key.verify(
		request.intent_message.as_bytes(),
		&DalekSignature::from_bytes(signature.as_bytes()),
	)
	.is_ok()
}

async fn create_session(State(state): State<ServerState>, Json(request): Json<CreateSessionRequest>) -> Response {
	let signature_valid = verify(&request);
	state.received.lock().push(Received {
		request: request.clone(),
		signature_valid,
	});

	let reply = state.reply.lock().clone();
	match reply {
		Reply::Accept { session_id } => Json(serde_json::json!({
			"success": true,
			"session_id": session_id,
			"session_key": request.session_key,
			"expires_at": request.expires,
			"user_public_key": request.public_key,
		}))
		.into_response(),
		Reply::Status(code, body) => {
			(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body).into_response()
		}
		Reply::Body(body) => ([(axum::http::header::CONTENT_TYPE, "application/json")], body).into_response(),
		Reply::Hang(delay) => {
			tokio::time::sleep(delay).await;
			StatusCode::GATEWAY_TIMEOUT.into_response()
		}
	}
}

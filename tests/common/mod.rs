//! In-process stand-in for an embedding server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Deserialize)]
struct EmbedRequest {
    inputs: Vec<String>,
}

#[derive(Default)]
struct MockState {
    /// Answer 503 for any request containing a chunk with this text.
    poison: Option<String>,
    max_delay_ms: u64,
    /// The first `flaky` requests stall for `stall_ms`, then answer 503.
    flaky: AtomicUsize,
    stall_ms: u64,
    requests: AtomicUsize,
}

/// A running mock server. Dropping it leaves the task running until the
/// test runtime shuts down.
pub struct MockServer {
    pub endpoint: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

/// Each embedding is `[chars, first char as f32]` so tests can check that
/// vectors line up with the chunks they were computed from.
async fn embed(
    State(state): State<Arc<MockState>>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<Vec<Vec<f32>>>, (StatusCode, String)> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let flaky = state
        .flaky
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if flaky {
        tokio::time::sleep(Duration::from_millis(state.stall_ms)).await;
        return Err((StatusCode::SERVICE_UNAVAILABLE, "warming up".into()));
    }
    if state.max_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(fastrand::u64(0..=state.max_delay_ms))).await;
    }
    if let Some(poison) = &state.poison {
        if request.inputs.iter().any(|text| text.contains(poison.as_str())) {
            return Err((StatusCode::SERVICE_UNAVAILABLE, "model overloaded".into()));
        }
    }
    Ok(Json(
        request
            .inputs
            .iter()
            .map(|text| {
                let first = text.chars().next().map_or(0.0, |c| c as u32 as f32);
                vec![text.chars().count() as f32, first]
            })
            .collect(),
    ))
}

pub async fn spawn_mock(poison: Option<&str>, max_delay_ms: u64) -> MockServer {
    serve(MockState {
        poison: poison.map(str::to_string),
        max_delay_ms,
        ..MockState::default()
    })
    .await
}

/// A server whose first `failures` requests stall for `stall_ms` and then
/// fail with 503. Later requests succeed at once.
pub async fn spawn_flaky_mock(failures: usize, stall_ms: u64) -> MockServer {
    serve(MockState {
        flaky: AtomicUsize::new(failures),
        stall_ms,
        ..MockState::default()
    })
    .await
}

async fn serve(state: MockState) -> MockServer {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/embed", post(embed))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        endpoint: format!("http://{addr}"),
        state,
    }
}

/// Records of `len` characters each, starting with a letter that cycles a..z.
pub fn records(count: usize, len: usize) -> Vec<embedbench::TextRecord> {
    (0..count)
        .map(|i| {
            let lead = char::from(b'a' + (i % 26) as u8);
            embedbench::TextRecord::new(std::iter::repeat_n(lead, len).collect::<String>())
        })
        .collect()
}

//! Client side of the tracker: a typed API wrapper, the persisted session
//! and the home view logic.

pub mod api;
pub mod session;
pub mod storage;
pub mod view;

pub use api::{ApiClient, ClientError};
pub use session::{Route, SessionContext};

/// Serves `state` on an ephemeral local port and returns its base URL.
#[cfg(test)]
pub(crate) async fn spawn_test_server(state: crate::state::AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = crate::app::build_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

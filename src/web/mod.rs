//! # Web Panel
//!
//! Small HTTP status and control page for one fan.
//!
//! ```text
//! GET  /               - control page
//! GET  /getstate.json  - last known fan and environment state, broker link
//! POST /setstate.json  - form fields mode, speed, rotate
//! GET  /toggle.json    - switch the fan on or off
//! ```
//!
//! The page state is fed by [`monitor_status`], which drains the dispatcher's
//! result channel. `CURRENT-STATE` replaces the known fan state, `STATE-CHANGE`
//! is merged into it.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{DeviceClient, Transport};
use crate::mqtt::MqttStatus;
use crate::protocol::states::{
    fan_speed_code, FAN_MODE_AUTO, FAN_MODE_OFF, FAN_MODE_ON, FAN_SPEED_AUTO, OFF, ON,
};
use crate::protocol::{DecodeResult, DeviceMessage, EnvironmentState, FanState, ProductState};

const INDEX_HTML: &str = include_str!("index.html");

/// Last known state of the device, as shown on the page.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct FanStatus {
    pub fan: ProductState,
    pub env: EnvironmentState,
}

#[derive(Serialize, Debug)]
struct StatusView {
    fan: ProductState,
    env: EnvironmentState,
    temperature_f: Option<i32>,
    connection: Option<MqttStatus>,
}

/// Form posted by the control page. Unrecognized values are ignored.
#[derive(Deserialize, Debug, Default)]
pub struct SetStateForm {
    pub mode: Option<String>,
    pub speed: Option<String>,
    pub rotate: Option<String>,
}

impl SetStateForm {
    pub fn to_fan_state(&self) -> FanState {
        let mut state = FanState::default();

        state.fan_mode = match self.mode.as_deref() {
            Some(mode @ (FAN_MODE_OFF | FAN_MODE_ON | FAN_MODE_AUTO)) => Some(mode.to_string()),
            _ => None,
        };

        state.fan_speed = match self.speed.as_deref() {
            Some(FAN_SPEED_AUTO) => Some(FAN_SPEED_AUTO.to_string()),
            Some(speed) => match speed.parse::<u8>() {
                Ok(speed @ 1..=10) => Some(fan_speed_code(speed)),
                _ => None,
            },
            None => None,
        };

        state.oscillate = match self.rotate.as_deref() {
            Some(rotate @ (ON | OFF)) => Some(rotate.to_string()),
            _ => None,
        };

        state
    }
}

pub struct PanelState<T> {
    client: DeviceClient<T>,
    status: RwLock<FanStatus>,
    connection: Option<watch::Receiver<MqttStatus>>,
}

impl<T: Transport> PanelState<T> {
    pub fn new(client: DeviceClient<T>) -> Self {
        Self {
            client,
            status: RwLock::new(FanStatus::default()),
            connection: None,
        }
    }

    /// Reports the broker link on `/getstate.json`.
    pub fn with_connection(mut self, connection: watch::Receiver<MqttStatus>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn client(&self) -> &DeviceClient<T> {
        &self.client
    }

    pub async fn snapshot(&self) -> FanStatus {
        self.status.read().await.clone()
    }

    /// Folds one dispatcher result into the known state.
    pub async fn apply(&self, result: DecodeResult) {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to decode device message: {}", e);
                return;
            }
        };

        let mut status = self.status.write().await;
        match message {
            DeviceMessage::CurrentState(state) => status.fan = state,
            DeviceMessage::StateChange(changes) => status.fan.merge(&changes),
            DeviceMessage::Environment(env) => status.env = env,
            DeviceMessage::Credentials(credentials) => {
                info!(
                    "Received credentials for device {}",
                    credentials.serial_number
                );
            }
        }
    }
}

/// Drains the dispatcher channel into `state` until the channel closes or
/// `cancel` fires.
pub async fn monitor_status<T: Transport>(
    state: Arc<PanelState<T>>,
    mut results: mpsc::Receiver<DecodeResult>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = results.recv() => result,
        };
        match result {
            Some(result) => {
                debug!("> {:?}", result);
                state.apply(result).await;
            }
            None => {
                debug!("Result channel closed, status monitor stopping");
                break;
            }
        }
    }
}

pub fn router<T: Transport + 'static>(state: Arc<PanelState<T>>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/getstate.json", get(serve_state::<T>))
        .route("/setstate.json", post(set_state::<T>))
        .route("/toggle.json", get(toggle_state::<T>))
        .with_state(state)
}

/// Serves the panel on `listen` until `cancel` fires.
pub async fn serve<T: Transport + 'static>(
    state: Arc<PanelState<T>>,
    listen: &str,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Web panel listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn serve_state<T: Transport>(State(state): State<Arc<PanelState<T>>>) -> Json<StatusView> {
    let status = state.snapshot().await;
    let temperature_f = status.env.temperature_fahrenheit();
    let connection = state
        .connection
        .as_ref()
        .map(|connection| connection.borrow().clone());
    Json(StatusView {
        fan: status.fan,
        env: status.env,
        temperature_f,
        connection,
    })
}

async fn set_state<T: Transport>(
    State(state): State<Arc<PanelState<T>>>,
    Form(form): Form<SetStateForm>,
) -> Result<Json<FanState>, StatusCode> {
    let fan_state = form.to_fan_state();
    if fan_state.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    publish(&state, fan_state).await
}

async fn toggle_state<T: Transport>(
    State(state): State<Arc<PanelState<T>>>,
) -> Result<Json<FanState>, StatusCode> {
    let currently_off = state.status.read().await.fan.is_fan_off();
    let mode = if currently_off { FAN_MODE_ON } else { FAN_MODE_OFF };
    let fan_state = FanState::default()
        .with_fan_mode(mode)
        .with_fan_speed(7)
        .with_oscillate(true)
        .with_sleep_timer("0030");
    publish(&state, fan_state).await
}

async fn publish<T: Transport>(
    state: &PanelState<T>,
    fan_state: FanState,
) -> Result<Json<FanState>, StatusCode> {
    match state.client.set_state(&fan_state).await {
        Ok(()) => Ok(Json(fan_state)),
        Err(e) => {
            error!("Failed to send state to device: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

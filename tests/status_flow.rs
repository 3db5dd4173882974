//! Raw device payloads through the dispatcher into the panel state.

use async_trait::async_trait;
use dyslink::client::{DeviceClient, DeviceModel, Transport, TransportError};
use dyslink::protocol::{DeviceMessage, MessageDispatcher};
use dyslink::web::{monitor_status, PanelState};
use rumqttc::QoS;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const TOPIC: &str = "475/NN4-CH-HEA0429A/status/current";

struct Discard;

#[async_trait]
impl Transport for Discard {
    async fn publish(&self, _: &str, _: Vec<u8>, _: QoS) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, _: &str, _: QoS) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn device_messages_build_up_the_panel_state() {
    let (dispatcher, results) = MessageDispatcher::channel(16);
    let panel = Arc::new(PanelState::new(DeviceClient::new(
        Discard,
        DeviceModel::PureCoolLink,
        "NN4-CH-HEA0429A",
    )));

    dispatcher.on_message(
        TOPIC,
        br#"{"msg":"CURRENT-STATE","time":"2017-05-10T19:25:03.000Z","mode-reason":"PUI","product-state":{"fmod":"OFF","fnsp":"0004","oson":"ON","qtar":"0003","rhtm":"ON","filf":"2087","ercd":"NONE","wacd":"NONE","nmod":"OFF","fnst":"OFF","rstf":"STET","sltm":"OFF","ffoc":"OFF"}}"#,
    );
    dispatcher.on_message(
        TOPIC,
        br#"{"msg":"STATE-CHANGE","time":"2017-05-10T19:25:09.000Z","product-state":{"fmod":["OFF","FAN"],"fnst":["OFF","FAN"],"fnsp":["0004","0007"],"oson":["ON","ON"]}}"#,
    );
    dispatcher.on_message(
        TOPIC,
        br#"{"msg":"ENVIRONMENTAL-CURRENT-SENSOR-DATA","time":"2017-05-10T19:25:10.000Z","data":{"tact":"2931","hact":"0040","pact":"0002","vact":"INIT","sltm":"OFF"}}"#,
    );
    dispatcher.on_message(TOPIC, br#"{"msg":"HELLO","time":"t"}"#);
    dispatcher.on_message(TOPIC, b"not json");
    drop(dispatcher);

    monitor_status(panel.clone(), results, CancellationToken::new()).await;

    let status = panel.snapshot().await;
    assert_eq!(status.fan.fan_mode.as_deref(), Some("FAN"));
    assert_eq!(status.fan.fan_state.as_deref(), Some("FAN"));
    assert_eq!(status.fan.fan_speed.as_deref(), Some("0007"));
    assert_eq!(status.fan.oscillate.as_deref(), Some("ON"));
    assert_eq!(status.fan.standby_monitoring.as_deref(), Some("ON"));
    assert_eq!(status.fan.filter_life.as_deref(), Some("2087"));
    assert!(!status.fan.is_fan_off());

    assert_eq!(status.env.humidity.as_deref(), Some("0040"));
    assert_eq!(status.env.temperature_fahrenheit(), Some(68));
}

#[tokio::test]
async fn credentials_reply_is_delivered() {
    let (dispatcher, mut results) = MessageDispatcher::channel(4);
    dispatcher.on_message(
        "475/initialconnection/credentials",
        br#"{"msg":"DEVICE-CREDENTIALS","time":"t","serialNumber":"NN4-CH-HEA0429A","apPasswordHash":"qkZRJ2T0RmU="}"#,
    );

    match results.recv().await {
        Some(Ok(DeviceMessage::Credentials(credentials))) => {
            assert_eq!(credentials.serial_number, "NN4-CH-HEA0429A");
            assert_eq!(credentials.password_hash, "qkZRJ2T0RmU=");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

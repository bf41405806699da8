//! Command dispatch
//!
//! Turns one validated [`ClientCommand`] into a state mutation and the
//! single reply the originating client receives. Rejected frames never
//! touch state.

use std::sync::Arc;

use contracts::{
    parse_command, ClientCommand, CommandRejection, CommandRequest, CommandStatus, MediaCommand,
    PositionSource, ServerMessage, ShortRangeLink,
};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use aggregator::SharedState;

/// Applies client commands to shared state and the command-side drivers
pub struct CommandHandler {
    state: Arc<SharedState>,
    position: Arc<dyn PositionSource>,
    link: Arc<dyn ShortRangeLink>,
}

impl CommandHandler {
    pub fn new(
        state: Arc<SharedState>,
        position: Arc<dyn PositionSource>,
        link: Arc<dyn ShortRangeLink>,
    ) -> Self {
        Self {
            state,
            position,
            link,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Parse one inbound text frame and produce the reply
    pub async fn handle_frame(&self, raw: &str) -> ServerMessage {
        match parse_command(raw) {
            Ok(command) => self.execute(command).await,
            Err(rejection) => {
                let action = match &rejection {
                    CommandRejection::InvalidValue { action, .. } => action.as_str(),
                    _ => "invalid",
                };
                debug!(action, reason = %rejection, "command rejected");
                observability::record_command(action, false);
                rejection.into()
            }
        }
    }

    /// Apply an already validated command
    #[instrument(name = "execute_command", skip(self, command), fields(action = command.action()))]
    pub async fn execute(&self, command: ClientCommand) -> ServerMessage {
        let action = command.action();
        observability::record_command(action, true);

        match command.into_request() {
            CommandRequest::Media(op) => {
                let stored = self.state.with_media(|m| match op {
                    MediaCommand::Play => {
                        m.play();
                        None
                    }
                    MediaCommand::Pause => {
                        m.pause();
                        None
                    }
                    MediaCommand::Next => {
                        m.next_track();
                        None
                    }
                    MediaCommand::Previous => {
                        m.previous_track();
                        None
                    }
                    MediaCommand::SetVolume(volume) => Some(json!(m.set_volume(volume))),
                });
                ServerMessage::response(action, CommandStatus::Success, stored)
            }
            CommandRequest::Setting(update) => {
                let value = self.state.apply_setting(update);
                ServerMessage::response(action, CommandStatus::Success, Some(value))
            }
            CommandRequest::Position(update) => {
                self.position.hand_off(update);
                let echo: Value =
                    json!({ "latitude": update.latitude, "longitude": update.longitude });
                ServerMessage::response(action, CommandStatus::Success, Some(echo))
            }
            CommandRequest::ConnectBluetooth { device_address } => {
                let ok = self.connect_bluetooth(device_address).await;
                ServerMessage::response(action, CommandStatus::from_success(ok), None)
            }
        }
    }

    /// Pairing may block on the radio, so it runs on the blocking pool.
    async fn connect_bluetooth(&self, device_address: String) -> bool {
        let link = Arc::clone(&self.link);
        let address = device_address.clone();
        match tokio::task::spawn_blocking(move || link.connect(&address)).await {
            Ok(Ok(device_name)) => {
                info!(device_address = %device_address, device = %device_name, "bluetooth paired");
                self.state.with_media(|m| m.connect_device(device_name));
                true
            }
            Ok(Err(e)) => {
                warn!(device_address = %device_address, error = %e, "bluetooth pairing failed");
                false
            }
            Err(e) => {
                warn!(device_address = %device_address, error = %e, "bluetooth pairing task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, PositionFix, PositionUpdate};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPosition {
        updates: Mutex<Vec<PositionUpdate>>,
    }

    impl PositionSource for RecordingPosition {
        fn read(&self) -> Result<PositionFix, ContractError> {
            Ok(PositionFix::default())
        }

        fn hand_off(&self, update: PositionUpdate) {
            self.updates.lock().unwrap().push(update);
        }

        fn is_handed_off(&self) -> bool {
            !self.updates.lock().unwrap().is_empty()
        }
    }

    struct Link(Result<&'static str, &'static str>);

    impl ShortRangeLink for Link {
        fn connect(&self, _device_address: &str) -> Result<String, ContractError> {
            self.0
                .map(str::to_string)
                .map_err(|e| ContractError::sensor_fault("bluetooth", e))
        }
    }

    fn build(link: Link) -> (CommandHandler, Arc<RecordingPosition>) {
        let position = Arc::new(RecordingPosition::default());
        let handler = CommandHandler::new(
            Arc::new(SharedState::default()),
            position.clone(),
            Arc::new(link),
        );
        (handler, position)
    }

    fn to_value(msg: ServerMessage) -> Value {
        serde_json::to_value(msg).unwrap()
    }

    #[tokio::test]
    async fn test_setter_echoes_stored_value() {
        let (handler, _) = build(Link(Ok("Phone")));
        let reply = to_value(handler.handle_frame(r#"{"action":"set_brightness","value":75}"#).await);
        assert_eq!(
            reply,
            json!({"type":"response","action":"set_brightness","status":"success","value":75})
        );
        assert_eq!(handler.state().settings().brightness, 75);
    }

    #[tokio::test]
    async fn test_rejected_frames_do_not_mutate() {
        let (handler, _) = build(Link(Ok("Phone")));
        let before = handler.state().settings();

        let reply = to_value(handler.handle_frame("not json").await);
        assert_eq!(reply, json!({"type":"error","message":"Invalid JSON format"}));

        let reply = to_value(handler.handle_frame(r#"{"action":"self_destruct"}"#).await);
        assert_eq!(reply["message"], "Invalid action: self_destruct");

        let reply = to_value(
            handler
                .handle_frame(r#"{"action":"set_charge_limit","value":120}"#)
                .await,
        );
        assert_eq!(reply["type"], "error");
        assert!(reply["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid value for set_charge_limit"));

        assert_eq!(handler.state().settings(), before);
    }

    #[tokio::test]
    async fn test_media_commands() {
        let (handler, _) = build(Link(Ok("Phone")));
        let reply = to_value(handler.handle_frame(r#"{"action":"play_music"}"#).await);
        assert_eq!(reply, json!({"type":"response","action":"play_music","status":"success"}));
        assert!(handler.state().with_media(|m| m.peek().is_playing));

        let reply = to_value(handler.handle_frame(r#"{"action":"set_volume","volume":0.8}"#).await);
        assert_eq!(reply["value"], 0.8);

        handler.handle_frame(r#"{"action":"next_track"}"#).await;
        let status = handler.state().with_media(|m| m.peek().clone());
        assert!(status.track_title.starts_with("Track "));
        assert_eq!(status.position, 0);
    }

    #[tokio::test]
    async fn test_bluetooth_success_and_failure() {
        let (handler, _) = build(Link(Ok("Mock Phone")));
        let reply = to_value(
            handler
                .handle_frame(r#"{"action":"connect_bluetooth","device_address":"AA:BB"}"#)
                .await,
        );
        assert_eq!(reply["status"], "success");
        assert!(handler.state().bluetooth_connected());
        assert_eq!(
            handler.state().with_media(|m| m.peek().device_name.clone()),
            "Mock Phone"
        );

        let (handler, _) = build(Link(Err("radio off")));
        let reply = to_value(handler.handle_frame(r#"{"action":"connect_bluetooth"}"#).await);
        assert_eq!(reply["status"], "failed");
        assert!(!handler.state().bluetooth_connected());
    }

    #[tokio::test]
    async fn test_update_gps_hands_off() {
        let (handler, position) = build(Link(Ok("Phone")));
        let reply = to_value(
            handler
                .handle_frame(r#"{"action":"update_gps","latitude":12.9716,"longitude":77.5946,"heading":90}"#)
                .await,
        );
        assert_eq!(reply["value"], json!({"latitude":12.9716,"longitude":77.5946}));

        let updates = position.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].heading_deg, Some(90.0));
    }
}

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use dyslink::client::{DeviceClient, DeviceModel};
use dyslink::config::AppConfig;
use dyslink::mqtt::{MqttHandler, MqttStatus, MqttTransport};
use dyslink::protocol::states::{
    FAN_MODE_AUTO, FAN_MODE_OFF, FAN_MODE_ON, FAN_SPEED_AUTO, OFF, QUALITY_TARGET_HIGH,
    QUALITY_TARGET_LOW,
};
use dyslink::protocol::{DecodeResult, FanState, MessageDispatcher};
use dyslink::web::{self, PanelState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Control a Dyson Pure Cool Link fan over its local MQTT broker
#[derive(Parser, Debug)]
#[command(name = "dyslink", version)]
struct Cli {
    /// Config file, defaults to <config dir>/dyslink/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device address as host or host:port
    #[arg(long, global = true)]
    host: Option<String>,

    /// Part of the setup SSID, e.g. NN4-CH-HEA0322B
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password from the sticker on the manual or under the filter
    #[arg(long, global = true)]
    password: Option<String>,

    /// Model code: 475, 469 or 455
    #[arg(long, global = true)]
    model: Option<DeviceModel>,

    /// Log every payload in and out
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web panel
    Serve {
        /// Listen address, overrides web.listen
        #[arg(long)]
        listen: Option<String>,
    },
    /// Send one state change to the fan
    Set(SetArgs),
    /// Request and print the current state
    Status {
        /// How long to wait for replies
        #[arg(long, default_value_t = 5)]
        wait_secs: u64,
    },
    /// Join a factory reset fan to a wifi network
    Bootstrap {
        #[arg(long)]
        ssid: String,
        #[arg(long)]
        wifi_password: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Args, Debug)]
struct SetArgs {
    /// Fan speed 1-10. 0 turns the fan off, -1 uses auto mode.
    #[arg(long, allow_hyphen_values = true)]
    fan_speed: Option<i8>,

    #[arg(long)]
    oscillate: Option<Switch>,

    #[arg(long)]
    night_mode: Option<Switch>,

    /// Sleep timer in minutes, 0 cancels the timer
    #[arg(long)]
    sleep_timer: Option<u16>,

    /// Target high air quality
    #[arg(long)]
    high_quality: Option<Switch>,

    /// Keep running and print status updates of the fan
    #[arg(long)]
    hang: bool,
}

impl SetArgs {
    fn to_fan_state(&self) -> Result<FanState> {
        let mut state = FanState::default();

        match self.fan_speed {
            None => {}
            Some(0) => state = state.with_fan_mode(FAN_MODE_OFF),
            Some(-1) => {
                state = state.with_fan_mode(FAN_MODE_AUTO);
                state.fan_speed = Some(FAN_SPEED_AUTO.to_string());
            }
            Some(speed @ 1..=10) => {
                state = state.with_fan_mode(FAN_MODE_ON).with_fan_speed(speed as u8)
            }
            Some(other) => return Err(eyre!("Fan speed {} out of range (-1..=10)", other)),
        }
        if let Some(oscillate) = self.oscillate {
            state = state.with_oscillate(oscillate.is_on());
        }
        if let Some(night_mode) = self.night_mode {
            state = state.with_night_mode(night_mode.is_on());
        }
        if let Some(minutes) = self.sleep_timer {
            state = match minutes {
                0 => state.with_sleep_timer(OFF),
                minutes => state.with_sleep_timer(format!("{:04}", minutes)),
            };
        }
        if let Some(high_quality) = self.high_quality {
            let target = if high_quality.is_on() {
                QUALITY_TARGET_HIGH
            } else {
                QUALITY_TARGET_LOW
            };
            state.quality_target = Some(target.to_string());
        }

        if state.is_empty() {
            return Err(eyre!("Nothing to set, see `dyslink set --help`"));
        }
        Ok(state)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    install_error_hooks()?;

    // Konfiguration laden, CLI-Flags überschreiben die Datei
    let mut config = AppConfig::load(cli.config.as_deref()).await?;
    apply_overrides(&mut config, &cli)?;
    setup_logging_env(config.debug);
    debug!("Effective configuration: {:?}", config);

    let cancel = CancellationToken::new();
    shutdown_on_ctrl_c(cancel.clone());

    let (dispatcher, results) = MessageDispatcher::channel(config.mqtt.channel_capacity);
    let handler = MqttHandler::spawn(&config.mqtt, dispatcher, CancellationToken::new());
    let client = DeviceClient::new(
        handler.transport(),
        config.mqtt.model,
        config.mqtt.username.clone(),
    );

    let outcome = match cli.command {
        Command::Serve { listen } => {
            let listen = listen.unwrap_or_else(|| config.web.listen.clone());
            run_serve(client, handler.status(), results, &listen, cancel).await
        }
        Command::Set(args) => run_set(client, &args, results, cancel).await,
        Command::Status { wait_secs } => {
            run_status(client, handler.status(), results, wait_secs, cancel).await
        }
        Command::Bootstrap {
            ssid,
            wifi_password,
        } => run_bootstrap(client, &ssid, &wifi_password, results, cancel).await,
    };

    handler.shutdown().await;
    outcome
}

fn install_error_hooks() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn setup_logging_env(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(host) = &cli.host {
        config.mqtt.set_address(host)?;
    }
    if let Some(user) = &cli.user {
        config.mqtt.username = user.clone();
    }
    if let Some(password) = &cli.password {
        config.mqtt.password = password.clone();
    }
    if let Some(model) = cli.model {
        config.mqtt.model = model;
    }
    if cli.debug {
        config.debug = true;
    }

    if config.mqtt.username.is_empty() {
        return Err(eyre!(
            "No device user configured, pass --user or set mqtt.username"
        ));
    }
    Ok(())
}

fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                cancel.cancel();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });
}

async fn run_serve(
    client: DeviceClient<MqttTransport>,
    connection: watch::Receiver<MqttStatus>,
    results: mpsc::Receiver<DecodeResult>,
    listen: &str,
    cancel: CancellationToken,
) -> Result<()> {
    client.subscribe_status().await?;
    client.request_current_state().await?;

    let state = Arc::new(PanelState::new(client).with_connection(connection));
    let monitor_cancel = cancel.child_token();
    let monitor = tokio::spawn(web::monitor_status(
        state.clone(),
        results,
        monitor_cancel.clone(),
    ));

    let served = web::serve(state, listen, cancel).await;
    monitor_cancel.cancel();
    if let Err(e) = monitor.await {
        error!("Status monitor task failed: {}", e);
    }
    served.map_err(|e| eyre!("Web panel on {} failed: {}", listen, e))
}

async fn run_set(
    client: DeviceClient<MqttTransport>,
    args: &SetArgs,
    results: mpsc::Receiver<DecodeResult>,
    cancel: CancellationToken,
) -> Result<()> {
    let state = args.to_fan_state()?;
    client.set_state(&state).await?;
    println!("Set: {}", serde_json::to_string(&state)?);

    if args.hang {
        client.subscribe_status().await?;
        print_messages(results, cancel).await;
    }
    Ok(())
}

async fn run_status(
    client: DeviceClient<MqttTransport>,
    connection: watch::Receiver<MqttStatus>,
    results: mpsc::Receiver<DecodeResult>,
    wait_secs: u64,
    cancel: CancellationToken,
) -> Result<()> {
    client.subscribe_status().await?;
    client.request_current_state().await?;

    let deadline = cancel.child_token();
    let timer = deadline.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        timer.cancel();
    });
    print_messages(results, deadline).await;

    let link = connection.borrow().clone();
    println!(
        "Connection: {:?}, {} received, {} sent",
        link.connection_state, link.messages_received, link.messages_sent
    );
    if let Some(e) = link.last_error {
        println!("Last error: {}", e);
    }
    Ok(())
}

async fn run_bootstrap(
    mut client: DeviceClient<MqttTransport>,
    ssid: &str,
    wifi_password: &str,
    results: mpsc::Receiver<DecodeResult>,
    cancel: CancellationToken,
) -> Result<()> {
    println!("Bootstrapping device into wifi network {}", ssid);
    client.wifi_bootstrap(ssid, wifi_password).await?;
    print_messages(results, cancel).await;
    Ok(())
}

async fn print_messages(mut results: mpsc::Receiver<DecodeResult>, cancel: CancellationToken) {
    println!("# waiting for status messages, hit CTRL+C to exit");
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = results.recv() => result,
        };
        match result {
            Some(Ok(message)) => println!("Message: {:?}", message),
            Some(Err(e)) => warn!("Failed to decode device message: {}", e),
            None => break,
        }
    }
}

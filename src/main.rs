mod app;
mod config;
mod device;
mod orientation;
mod router;
mod sdk;
mod session;
mod surface;

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::app::{AppShell, UiCommand};
use crate::config::{ensure_default_config, AppConfig};
use crate::device::{DeviceServices, SimulatedAudio, SimulatedSensor};
use crate::sdk::simulated::{SimulatedConnector, SimulatedEngine};
use crate::sdk::{
    CallEngine, CallHandle, CallStatus, CanCreateCallError, CanCreateCallFault, ConnectError,
    ConnectFault,
};

/// Device angles swept while a call screen is shown
const SWEEP: [i32; 6] = [0, 80, 170, 260, 350, 10];

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await;
    let (sensor, samples) = SimulatedSensor::new(config.device.orientation_sensor);
    let audio = Arc::new(SimulatedAudio::default());
    let device = DeviceServices {
        sensor: sensor.clone(),
        audio: audio.clone(),
        display: config.display(),
    };
    let connector = Arc::new(SimulatedConnector::new());
    let mut shell = AppShell::new(config.clone(), connector.clone(), device);

    let (commands, command_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            ctrl_c.cancel();
        }
    });

    let accounts = config.demo_accounts();
    info!("{} demo accounts", accounts.len());
    let Some(user) = accounts.user_ids().next().map(str::to_string) else {
        warn!("No demo account to log in with");
        return Ok(());
    };
    let demo = Demo {
        commands,
        connector,
        sensor,
        audio,
        sample_interval: Duration::from_millis(config.orientation.sample_interval_ms),
        user,
    };
    let script = tokio::spawn(demo.run(shutdown.clone()));

    shell.launch();
    shell.run(samples, command_rx, shutdown).await;

    if let Err(e) = script.await {
        warn!("Demo script aborted: {}", e);
    }
    info!(
        "Bye, {} bus listeners left",
        shell.session().bus().listener_count()
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> AppConfig {
    let path = AppConfig::default_path();
    if let Err(e) = ensure_default_config(&path).await {
        warn!("Could not write default config: {}", e);
    }
    AppConfig::load_or_default(&path).await
}

/// Scripted session against the simulated engine
struct Demo {
    commands: mpsc::UnboundedSender<UiCommand>,
    connector: Arc<SimulatedConnector>,
    sensor: Arc<SimulatedSensor>,
    audio: Arc<SimulatedAudio>,
    sample_interval: Duration,
    user: String,
}

impl Demo {
    const PAUSE: Duration = Duration::from_millis(300);

    fn send(&self, command: UiCommand) {
        if self.commands.send(command).is_err() {
            warn!("UI loop gone");
        }
    }

    async fn step(&self, command: UiCommand) {
        self.send(command);
        tokio::time::sleep(Self::PAUSE).await;
    }

    /// Failed connection, login, outgoing calls, a declined and an answered
    /// incoming call, a network flap, then loss of the SIP registration
    async fn run(self, shutdown: CancellationToken) {
        self.connector.fail_next_connection(ConnectError::new(
            ConnectFault::Network,
            "Network unreachable",
        ));
        self.step(UiCommand::SubmitAppId("callhelper-demo".to_string()))
            .await;
        self.step(UiCommand::SubmitAppId("callhelper-demo".to_string()))
            .await;
        self.step(UiCommand::ChooseUser(self.user.clone())).await;
        self.step(UiCommand::SetDisplayName("Kenzo Tenma".to_string()))
            .await;

        let Some(engine) = self.connector.engine() else {
            warn!("No engine was initialized");
            shutdown.cancel();
            return;
        };

        self.step(UiCommand::ToggleCheckedMode).await;
        self.step(UiCommand::CallContact("fortner-n".to_string())).await;
        self.step(UiCommand::ToggleCheckedMode).await;

        // Outgoing call abandoned before the remote side answers
        self.step(UiCommand::CallContact("fortner-n".to_string())).await;
        self.step(UiCommand::CancelOutgoingCall).await;

        // Outgoing call the remote side answers with video
        self.step(UiCommand::CallContact("runge_h@bka.de".to_string()))
            .await;
        if let Some(call) = engine.current_call() {
            engine.set_call_status(call.call_id(), CallStatus::Active);
            tokio::time::sleep(Self::PAUSE).await;
            engine.set_receiving_video(call.call_id(), true);
        }
        tokio::time::sleep(Self::PAUSE).await;
        self.sweep().await;
        self.step(UiCommand::ToggleSpeakerphone).await;
        self.audio.plug_headset(true);
        self.step(UiCommand::HeadsetChanged).await;
        self.step(UiCommand::ToggleMute).await;
        self.step(UiCommand::ToggleVideo).await;
        self.step(UiCommand::ToggleVideo).await;
        self.step(UiCommand::ToggleVideoSource).await;
        self.step(UiCommand::Background).await;
        self.step(UiCommand::Foreground).await;
        self.step(UiCommand::Back).await;
        self.step(UiCommand::HangUp).await;

        // Incoming call declined from the prompt
        match engine.incoming_call("Eva Heinman") {
            Some(call_id) => {
                tokio::time::sleep(Self::PAUSE).await;
                self.step(UiCommand::Decline(call_id)).await;
            }
            None => warn!("Incoming call rejected"),
        }

        // Incoming call picked up from the prompt
        match engine.incoming_call("Johan Liebert") {
            Some(call_id) => {
                tokio::time::sleep(Self::PAUSE).await;
                self.step(UiCommand::PickUp(call_id)).await;
                self.sweep().await;
                self.step(UiCommand::HangUp).await;
            }
            None => warn!("Incoming call rejected"),
        }

        engine.set_can_create_call(Some(CanCreateCallError::new(
            CanCreateCallFault::NetworkLost,
            "Network lost",
        )));
        tokio::time::sleep(Self::PAUSE).await;
        engine.set_can_create_call(None);
        tokio::time::sleep(Self::PAUSE).await;

        // Fatal for the contact list; the engine stays until disconnected
        engine.set_can_create_call(Some(CanCreateCallError::new(
            CanCreateCallFault::SipNok,
            "SIP registration refused",
        )));
        tokio::time::sleep(Self::PAUSE).await;
        self.step(UiCommand::Disconnect).await;

        report(&engine);
        shutdown.cancel();
    }

    async fn sweep(&self) {
        for degrees in SWEEP {
            if !self.sensor.emit(degrees) {
                info!("Sensor idle, sweep skipped");
                return;
            }
            tokio::time::sleep(self.sample_interval).await;
        }
    }
}

fn report(engine: &SimulatedEngine) {
    info!(
        "Session of {:?} ended, engine closed: {}",
        engine.user(),
        engine.is_closed()
    );
}

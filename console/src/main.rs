// Ocufly Operator Console
// Line-driven flight console for a Tello-class drone over the Ocufly link

use anyhow::Result;
use ocufly_link::{LinkConfig, Session, SessionHandle, Submission, TelemetryEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod operator;
mod ui_state;

use operator::{parse_line, OperatorAction, HELP};
use ui_state::UiState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ocufly=info,ocufly_link=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LinkConfig::from_env();
    let telemetry_json = std::env::var("OCUFLY_TELEMETRY_JSON")
        .map(|v| v == "1")
        .unwrap_or(false);

    let mut session = Session::open(config).await?;
    let handle = session.handle();
    let mut telemetry = handle.subscribe_telemetry();

    info!("🚁 Ocufly console ready, drone at {}", config.drone_addr);
    println!("{}", HELP);

    let mut ui = UiState::default();
    ui.sync_controls(session.translator());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            reason = handle.terminated() => {
                info!("Session ended: {:?}", reason);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                session.quit().await;
            }
            event = telemetry.recv() => match event {
                Ok(event) => {
                    ui.apply_event(&event);
                    if matches!(event, TelemetryEvent::Battery { .. }) {
                        refresh(&mut ui, &session, &handle);
                        println!("{}", ui.status_line());
                    }
                    if telemetry_json {
                        print_json(&event);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Telemetry display skipped {} events", n),
                Err(RecvError::Closed) => {}
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    dispatch(&mut session, &mut ui, line.trim_end()).await;
                    refresh(&mut ui, &session, &handle);
                    println!("{}", ui.status_line());
                }
                None => {
                    session.quit().await;
                }
            },
        }
    }

    let reason = session.shutdown().await;
    info!("Program exited ({:?})", reason);
    Ok(())
}

async fn dispatch(session: &mut Session, ui: &mut UiState, line: &str) {
    if line.is_empty() {
        return;
    }

    let result = match parse_line(line) {
        OperatorAction::Connect => session.connect().await,
        OperatorAction::Takeoff => session.takeoff().await,
        OperatorAction::Land => session.land().await,
        OperatorAction::Battery => session.request_battery().await.map(|_| ()),
        OperatorAction::End => {
            session.end().await;
            Ok(())
        }
        OperatorAction::Input(event) => session.handle_input(event).await.map(|_| ()),
        OperatorAction::Text(text) => match session.submit(&text).await {
            Ok(Submission::Terminated) => {
                println!("Program exited successfully");
                Ok(())
            }
            Ok(Submission::Sent(_)) => Ok(()),
            Err(e) => Err(e),
        },
        OperatorAction::Help => {
            println!("{}", HELP);
            Ok(())
        }
        OperatorAction::Unknown(line) => {
            warn!("Unknown console action: {}", line);
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        ui.incoming = format!("Error: {}", e);
    }
}

fn refresh(ui: &mut UiState, session: &Session, handle: &SessionHandle) {
    ui.sync_controls(session.translator());
    ui.session = handle.state();
    if let Some(reading) = handle.battery() {
        ui.apply_battery(&reading);
    }
}

fn print_json(event: &TelemetryEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("Failed to encode telemetry: {}", e),
    }
}

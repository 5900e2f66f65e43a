use std::error::Error;

#[cfg(target_os = "linux")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use bluefuzz::{BluerRadio, Config, Intent, Session, SessionEvent};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tracing::{info, metadata::LevelFilter, warn};
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;
    let radio = BluerRadio::new().await?;
    let (session, handle, mut events) = Session::new(config, radio)?;
    let task = tokio::spawn(session.run());

    info!("commands: scan on|off, tx on|off, fuzz on|off|toggle, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "quit" {
                    break;
                }
                match line.parse::<Intent>() {
                    Ok(intent) => {
                        // failures also arrive as events
                        let _ = handle.apply(intent).await;
                    }
                    Err(err) => warn!("{}", err),
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::State(state)) => {
                    println!("{}", state.status_line());
                    println!("{}", state.fuzz_status());
                }
                Some(SessionEvent::DevicesCleared) => println!("-- device list cleared --"),
                Some(SessionEvent::Device { record, .. }) => println!("{record}"),
                Some(SessionEvent::Failed { message, .. }) => println!("ERROR: {message}"),
                None => break,
            },
        }
    }

    handle.shutdown().await;
    task.await?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<(), Box<dyn Error>> {
    Err("this demo needs the BlueZ backend".into())
}

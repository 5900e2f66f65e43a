use std::error::Error;

#[cfg(target_os = "linux")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use bluefuzz::{BluerRadio, Config, Session, SessionEvent};
    use tracing::{info, metadata::LevelFilter};
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
    tokio::spawn(session.run());

    info!("starting scan");
    handle.start_scan().await?;
    info!("scan started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(SessionEvent::Device { delta, record }) => info!("{:?} {}", delta, record),
                Some(SessionEvent::Failed { message, .. }) => info!("{}", message),
                Some(_) => {}
                None => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<(), Box<dyn Error>> {
    Err("this demo needs the BlueZ backend".into())
}

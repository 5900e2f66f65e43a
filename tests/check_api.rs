#![allow(clippy::let_unit_value)]

use bluefuzz::*;

fn assert_send<T: Send>(t: T) -> T {
    t
}

async fn check_handle_apis(handle: SessionHandle) -> Result<()> {
    let _res: Result<()> = assert_send(handle.start_scan()).await;
    let _res: Result<StopOutcome> = assert_send(handle.stop_scan()).await;
    let _res: Result<()> = assert_send(handle.start_advertising()).await;
    let _res: Result<StopOutcome> = assert_send(handle.stop_advertising()).await;
    let _res: Result<bool> = assert_send(handle.toggle_fuzzing()).await;
    let _res: Result<()> = assert_send(handle.apply(Intent::FuzzOn)).await;
    let _state: Result<ControllerState> = assert_send(handle.state()).await;
    let _devices: Result<Vec<DeviceRecord>> = assert_send(handle.devices()).await;
    let _shutdown: () = assert_send(handle.shutdown()).await;

    Ok(())
}

async fn check_controller_apis<R: Radio>(mut controller: AdvertisementController, mut radio: R) -> Result<()> {
    let _res: Result<()> = assert_send(controller.start_advertising(&mut radio)).await;
    let _fuzzing: bool = controller.toggle_fuzzing();
    let _res: Result<()> = assert_send(controller.tick(&mut radio)).await;
    let _res: Result<StopOutcome> = assert_send(controller.stop_advertising(&mut radio)).await;
    let _res: () = assert_send(controller.shutdown(&mut radio)).await;

    Ok(())
}

#[allow(unused)]
async fn check_session_apis<R: Radio + 'static>(radio: R) -> Result<()> {
    let (session, handle, _events) = Session::new(Config::default(), radio)?;
    let _run: () = assert_send(session.run()).await;
    check_handle_apis(handle).await?;

    let controller = AdvertisementController::new(&Config::default())?;
    let radio: Box<dyn Radio> = Box::new(dyn_radio());
    check_controller_apis(controller, radio).await?;

    Ok(())
}

#[cfg(target_os = "linux")]
#[allow(unused)]
async fn check_bluer_apis() -> Result<()> {
    let radio: Result<BluerRadio> = assert_send(BluerRadio::new()).await;
    check_session_apis(radio?).await
}

fn dyn_radio() -> impl Radio {
    struct Null;

    #[async_trait::async_trait]
    impl Radio for Null {
        async fn start_scan(&mut self, _events: RadioEventSender) -> Result<()> {
            Ok(())
        }

        async fn stop_scan(&mut self) -> Result<()> {
            Ok(())
        }

        async fn start_transmit(&mut self, _advertisement: &Advertisement) -> Result<()> {
            Ok(())
        }

        async fn stop_transmit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    Null
}

fn main() {}

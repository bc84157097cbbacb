mod grabber;
mod router;
mod uinput_emitter;

use anyhow::{Context, Result};
use evdev::uinput::VirtualDevice;
use grabber::DeviceEvent;
use midclick_core::config::{self, Config};
use midclick_core::emulation::{ConfigStatus, EmulationContext};
use midclick_core::ipc::{self, ClientMsg, DaemonMsg};
use router::PointerRouter;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Shared state between the event loop and IPC handlers.
struct Shared {
    /// One slot per grabbed pointer; `None` once the device is gone.
    routers: Vec<Option<PointerRouter>>,
    vdev: VirtualDevice,
}

fn live_routers(
    routers: &mut [Option<PointerRouter>],
) -> impl Iterator<Item = &mut PointerRouter> {
    routers.iter_mut().flatten()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("midclickd=info".parse()?),
        )
        .init();

    info!("midclickd starting");

    let config = Config::load().context("loading config")?;
    info!(
        default = ?config.emulation.default,
        timeout_ms = config.emulation.timeout_ms,
        "config loaded"
    );

    let pointers = grabber::find_pointers(&config.devices).context("finding pointers")?;
    if pointers.is_empty() {
        anyhow::bail!("no pointing devices found; check permissions (group 'input' or udev rules)");
    }

    let vdev = uinput_emitter::create_virtual_device().context("creating virtual device")?;

    let routers = pointers
        .iter()
        .map(|p| {
            let enabled = config.emulation.default_enabled(p.has_middle);
            info!(device = %p.name, enabled, "middle button emulation attached");
            let emulation = EmulationContext::new(p.name.clone(), enabled)
                .with_timeout(config.emulation.timeout());
            Some(PointerRouter::new(p.name.clone(), emulation))
        })
        .collect();

    let shared = Arc::new(Mutex::new(Shared { routers, vdev }));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    for (idx, pointer) in pointers.iter().enumerate() {
        let tx = event_tx.clone();
        let path = pointer.path.clone();
        tokio::spawn(async move {
            if let Err(e) = grabber::grab_device(path.clone(), idx, tx).await {
                error!(path = %path.display(), error = %e, "grabber task failed");
            }
        });
    }
    drop(event_tx); // Close our copy so the channel closes when all grabbers exit

    let socket_path = config::socket_path();
    // Remove stale socket
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    let shared_ipc = Arc::clone(&shared);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let shared = Arc::clone(&shared_ipc);
                    tokio::spawn(handle_ipc_client(stream, shared));
                }
                Err(e) => {
                    warn!(error = %e, "IPC accept error");
                }
            }
        }
    });

    // Main event loop: chord deadlines are woken here, on the same path as
    // button events, so a timeout is never reordered against them.
    loop {
        let deadline = {
            let mut shared = shared.lock().await;
            let next = live_routers(&mut shared.routers)
                .filter_map(|r| r.next_deadline())
                .min();
            next
        };
        let sleep_fut = match deadline {
            Some(dl) => {
                let wait = Duration::from_micros(dl.saturating_sub(router::now_us()));
                tokio::time::sleep(wait)
            }
            None => tokio::time::sleep(Duration::from_secs(86400)),
        };
        let has_deadline = deadline.is_some();

        tokio::select! {
            Some(dev_event) = event_rx.recv() => {
                let mut shared = shared.lock().await;
                let Shared { routers, vdev } = &mut *shared;
                match dev_event {
                    DeviceEvent::Input { device_idx, event } => {
                        if let Some(Some(router)) = routers.get_mut(device_idx) {
                            router.process_event(event, vdev);
                        }
                    }
                    DeviceEvent::Removed { device_idx } => {
                        if let Some(slot) = routers.get_mut(device_idx) {
                            if let Some(mut router) = slot.take() {
                                router.release_all(router::now_us(), vdev);
                                info!(device = %router.status().name, "device removed");
                            }
                        }
                    }
                }
            }
            _ = sleep_fut, if has_deadline => {
                let now = router::now_us();
                let mut shared = shared.lock().await;
                let Shared { routers, vdev } = &mut *shared;
                for router in live_routers(routers) {
                    router.check_timer(now, vdev);
                }
            }
            else => break,
        }
    }

    info!("midclickd shutting down");
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

fn ack(ok: bool, message: impl Into<String>) -> String {
    ipc::encode(&DaemonMsg::Ack {
        ok,
        message: message.into(),
    })
}

/// Apply one client request to every live device and build the reply.
fn handle_request(routers: &mut [Option<PointerRouter>], msg: ClientMsg) -> String {
    match msg {
        ClientMsg::Enable => {
            for router in live_routers(routers) {
                router.emulation_mut().set_enabled(true);
            }
            ack(true, "enabled")
        }
        ClientMsg::Disable => {
            for router in live_routers(routers) {
                router.emulation_mut().set_enabled(false);
            }
            ack(true, "disabled")
        }
        ClientMsg::Toggle => {
            let new_state = !live_routers(routers)
                .next()
                .map(|r| r.emulation_mut().requested_enabled())
                .unwrap_or(false);
            for router in live_routers(routers) {
                router.emulation_mut().set_enabled(new_state);
            }
            info!(enabled = new_state, "toggled");
            ack(true, format!("enabled: {}", new_state))
        }
        ClientMsg::Set { value } => {
            let mut status = ConfigStatus::Success;
            for router in live_routers(routers) {
                status = router.emulation_mut().configure(&value);
                if status == ConfigStatus::Invalid {
                    break;
                }
            }
            match status {
                ConfigStatus::Success => ack(true, format!("set to {}", value)),
                ConfigStatus::Invalid => ack(false, format!("invalid value '{}'", value)),
            }
        }
        ClientMsg::GetStatus => {
            let devices = live_routers(routers).map(|r| r.status()).collect();
            ipc::encode(&DaemonMsg::Status {
                devices,
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
        }
    }
}

async fn handle_ipc_client(stream: UnixStream, shared: Arc<Mutex<Shared>>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            continue;
        };

        let reply = {
            let mut shared = shared.lock().await;
            handle_request(&mut shared.routers, msg)
        };

        if writer.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routers(enabled: &[bool]) -> Vec<Option<PointerRouter>> {
        enabled
            .iter()
            .enumerate()
            .map(|(i, &on)| {
                let name = format!("mouse {}", i);
                Some(PointerRouter::new(
                    name.clone(),
                    EmulationContext::new(name, on),
                ))
            })
            .collect()
    }

    fn reply(routers: &mut [Option<PointerRouter>], msg: ClientMsg) -> DaemonMsg {
        ipc::decode_daemon(handle_request(routers, msg).trim()).expect("valid reply")
    }

    #[test]
    fn disable_applies_to_every_device() {
        let mut rs = routers(&[true, true]);
        let DaemonMsg::Ack { ok, .. } = reply(&mut rs, ClientMsg::Disable) else {
            panic!("expected ack");
        };
        assert!(ok);
        for r in live_routers(&mut rs) {
            assert!(!r.emulation_mut().get_enabled());
        }
    }

    #[test]
    fn toggle_follows_first_device() {
        let mut rs = routers(&[false, true]);
        reply(&mut rs, ClientMsg::Toggle);
        for r in live_routers(&mut rs) {
            assert!(r.emulation_mut().get_enabled());
        }
    }

    #[test]
    fn set_rejects_unknown_value() {
        let mut rs = routers(&[true]);
        let DaemonMsg::Ack { ok, message } = reply(
            &mut rs,
            ClientMsg::Set {
                value: "sideways".into(),
            },
        ) else {
            panic!("expected ack");
        };
        assert!(!ok);
        assert!(message.contains("sideways"));
        assert!(live_routers(&mut rs).all(|r| r.emulation_mut().get_enabled()));
    }

    #[test]
    fn set_accepts_synonyms() {
        let mut rs = routers(&[true]);
        reply(&mut rs, ClientMsg::Set { value: " OFF ".into() });
        assert!(live_routers(&mut rs).all(|r| !r.emulation_mut().get_enabled()));
    }

    #[test]
    fn status_skips_removed_devices() {
        let mut rs = routers(&[true, false, true]);
        rs[1] = None;
        let DaemonMsg::Status { devices, version } = reply(&mut rs, ClientMsg::GetStatus) else {
            panic!("expected status");
        };
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
        let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["mouse 0", "mouse 2"]);
        assert!(devices.iter().all(|d| d.state == "IDLE" && !d.pending));
    }
}

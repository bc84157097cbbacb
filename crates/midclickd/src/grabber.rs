use crate::uinput_emitter::VIRTUAL_DEVICE_NAME;
use anyhow::{Context, Result};
use evdev::{Device, InputEvent, Key, RelativeAxisType};
use midclick_core::config::DeviceFilter;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Messages from grabbed pointers, tagged with the device index.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Input { device_idx: usize, event: InputEvent },
    /// The device went away or its stream failed.
    Removed { device_idx: usize },
}

/// A pointing device eligible for middle button emulation.
#[derive(Debug, Clone)]
pub struct PointerInfo {
    pub path: PathBuf,
    pub name: String,
    /// Has a physical middle button, so emulation defaults to off in auto mode.
    pub has_middle: bool,
}

/// Find all relative pointers with a left and a right button under /dev/input/.
pub fn find_pointers(filter: &DeviceFilter) -> Result<Vec<PointerInfo>> {
    let mut pointers = Vec::new();
    let input_dir = Path::new("/dev/input");

    for entry in std::fs::read_dir(input_dir).context("reading /dev/input")? {
        let entry = entry?;
        let path = entry.path();

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.starts_with("event") {
            continue;
        }

        match Device::open(&path) {
            Ok(dev) => {
                let dev_name = dev.name().unwrap_or("unknown").to_string();
                // Skip our own virtual device to avoid a feedback loop
                if dev_name == VIRTUAL_DEVICE_NAME {
                    debug!(path = %path.display(), name = %dev_name, "skipping own virtual device");
                    continue;
                }
                if !is_chord_pointer(&dev) {
                    continue;
                }
                if !filter.accepts(&dev_name) {
                    info!(path = %path.display(), name = %dev_name, "pointer excluded by config");
                    continue;
                }
                let has_middle = dev
                    .supported_keys()
                    .map_or(false, |keys| keys.contains(Key::BTN_MIDDLE));
                info!(path = %path.display(), name = %dev_name, has_middle, "found pointer");
                pointers.push(PointerInfo {
                    path,
                    name: dev_name,
                    has_middle,
                });
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping device");
            }
        }
    }

    Ok(pointers)
}

/// A device can chord if it moves relatively and has both BTN_LEFT and BTN_RIGHT.
fn is_chord_pointer(dev: &Device) -> bool {
    let Some(keys) = dev.supported_keys() else {
        return false;
    };
    let Some(axes) = dev.supported_relative_axes() else {
        return false;
    };

    keys.contains(Key::BTN_LEFT)
        && keys.contains(Key::BTN_RIGHT)
        && axes.contains(RelativeAxisType::REL_X)
        && axes.contains(RelativeAxisType::REL_Y)
}

/// Grab a pointer and forward its events to the channel. Sends
/// `DeviceEvent::Removed` once the device stops producing events.
pub async fn grab_device(
    path: PathBuf,
    device_idx: usize,
    tx: mpsc::UnboundedSender<DeviceEvent>,
) -> Result<()> {
    let result = forward_events(&path, device_idx, &tx).await;
    let _ = tx.send(DeviceEvent::Removed { device_idx });
    result
}

async fn forward_events(
    path: &Path,
    device_idx: usize,
    tx: &mpsc::UnboundedSender<DeviceEvent>,
) -> Result<()> {
    let mut dev = Device::open(path).with_context(|| format!("opening {}", path.display()))?;

    let dev_name = dev.name().unwrap_or("unknown").to_string();
    info!(device = %dev_name, path = %path.display(), "grabbing device");

    dev.grab()
        .with_context(|| format!("grabbing {}", path.display()))?;

    let mut stream = dev.into_event_stream().context("creating event stream")?;

    loop {
        match stream.next_event().await {
            Ok(event) => {
                if tx.send(DeviceEvent::Input { device_idx, event }).is_err() {
                    // Receiver dropped, shut down
                    break;
                }
            }
            Err(e) => {
                warn!(device = %dev_name, error = %e, "device error, stopping grab");
                break;
            }
        }
    }

    Ok(())
}

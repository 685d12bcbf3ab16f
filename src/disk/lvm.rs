// Device-mapper (LVM) resolution: /dev/mapper/<vg>-<lv> -> dm-N -> slave partitions.

use super::depend::{DiskDepend, file_name};
use crate::error::PalError;
use crate::log_suppressor::LogSuppressor;
use std::sync::LazyLock;
use tracing::Level;

const DEV_MAPPER: &str = "/dev/mapper/";
const DM_CONTROL: &str = "/dev/mapper/control";
/// Bound on slave traversal in case sysfs links form a cycle.
const MAX_SLAVE_WALK: usize = 1000;

static ERROR_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::ERROR, Level::TRACE));
static WARNING_SUPPRESSOR: LazyLock<LogSuppressor> =
    LazyLock::new(|| LogSuppressor::new(Level::WARN, Level::TRACE));

/// True for entries under /dev/mapper other than the control node.
pub fn is_dm_device(device: &str) -> bool {
    device.starts_with(DEV_MAPPER) && !device.starts_with(DM_CONTROL)
}

/// Map an LVM device path to its dm device. `Ok(None)` when the path is not
/// a device-mapper path at all.
pub fn get_dm_device<D: DiskDepend + ?Sized>(deps: &D, device: &str) -> Result<Option<String>, PalError> {
    if device.starts_with("/dev/dm-") {
        return Ok(Some(device.to_string()));
    }
    if !is_dm_device(device) {
        tracing::trace!(device = %device, "not a device-mapper path");
        return Ok(None);
    }

    let st = deps.stat(device)?;
    let dm_device = format!("/dev/dm-{}", st.rdev_minor);
    match deps.stat(&dm_device) {
        Ok(dm) if dm.rdev_major == st.rdev_major && dm.rdev_minor == st.rdev_minor => Ok(Some(dm_device)),
        Ok(_) => {
            let msg = format!(
                "LVM device {} and dm device {} do not have matching device ids",
                device, dm_device
            );
            ERROR_SUPPRESSOR.log(device, &msg);
            Err(PalError::InternalError(msg))
        }
        Err(e) if e.is_resource_vanished() => {
            // Some systems only expose the dm node through sysfs.
            let dm_name = format!("dm-{}", st.rdev_minor);
            let dev_file = format!("/sys/block/{}/dev", dm_name);
            if match_id_in_file(deps, &dev_file, st.rdev_major, st.rdev_minor)? {
                Ok(Some(dm_name))
            } else {
                let msg = format!("the device {} does not map to {}", device, dm_name);
                ERROR_SUPPRESSOR.log(device, &msg);
                Err(PalError::InternalError(msg))
            }
        }
        Err(e) => Err(e),
    }
}

/// Block devices backing a dm device, following nested dm devices.
pub fn get_dm_slaves<D: DiskDepend + ?Sized>(deps: &D, dm_device: &str) -> Result<Vec<String>, PalError> {
    let mut stack = vec![file_name(dm_device).to_string()];
    let mut slaves: Vec<(String, String)> = Vec::new();
    let mut walked = 0;

    while let Some(current) = stack.pop() {
        walked += 1;
        if walked > MAX_SLAVE_WALK {
            let msg = format!("exceeded {} entries while evaluating device {}", MAX_SLAVE_WALK, dm_device);
            ERROR_SUPPRESSOR.log(dm_device, &msg);
            slaves.clear();
            break;
        }
        let dir = format!("/sys/block/{}/slaves/", current);
        for entry in deps.get_files_in_directory(&dir)? {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with("dm-") {
                stack.push(name.to_string());
            } else {
                slaves.push((dir.clone(), name.to_string()));
            }
        }
    }

    if slaves.is_empty() {
        let msg = format!("there are no slave entries for the device {}", dm_device);
        ERROR_SUPPRESSOR.log(dm_device, &msg);
        return Err(PalError::InternalError(msg));
    }

    let mut result = Vec::new();
    for (dir, name) in slaves {
        // Nested /dev paths are encoded with '!' in sysfs.
        let dev_path = format!("/dev/{}", name.replace('!', "/"));
        let st = deps.stat(&dev_path)?;
        let dev_file = format!("{}{}/dev", dir, name);
        if match_id_in_file(deps, &dev_file, st.rdev_major, st.rdev_minor)? {
            result.push(dev_path);
        } else {
            let msg = format!("slave {} does not match {}", dev_file, dev_path);
            WARNING_SUPPRESSOR.log(&dev_file, &msg);
        }
    }
    Ok(result)
}

/// True when `path` holds `major:minor` equal to the given pair.
fn match_id_in_file<D: DiskDepend + ?Sized>(deps: &D, path: &str, major: u64, minor: u64) -> Result<bool, PalError> {
    let content = deps.read_to_string(path)?;
    let Some((maj, min)) = content.trim().split_once(':') else {
        return Err(PalError::InternalError(format!(
            "unexpected device id '{}' in {}",
            content.trim(),
            path
        )));
    };
    Ok(maj.trim().parse::<u64>().ok() == Some(major) && min.trim().parse::<u64>().ok() == Some(minor))
}

// Physical disk discovery outside Linux: the perfstat disk list on AIX and
// `vgdisplay -v` volume groups on HP-UX.

use super::depend::{DiskDepend, file_name};
use crate::error::PalError;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

pub const VGDISPLAY_COMMAND: &str = "/sbin/vgdisplay -v";
const LVM_QUERY_TIMEOUT: Duration = Duration::from_millis(15000);

// Either "VG Name /dev/vg00" (group 1) or "LV|PV Name /dev/<dir>/<name>"
// (groups 2 and 3); names must sit one directory below /dev.
static VGDISPLAY_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[ \t]*VG[ \t]+Name[ \t]+(/dev/[^/]+)$|",
        r"^[ \t]*(LV|PV)[ \t]+Name[ \t]+(/dev/[^/]+/[ \t]*([^/ \t]|[^/ \t][^/]+[^/ \t])[ \t]*)$",
    ))
    .ok()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeGroup {
    pub name: String,
    pub logical_volumes: Vec<String>,
    pub physical_volumes: Vec<String>,
}

/// Volume groups listed by `vgdisplay -v`, in output order.
pub fn parse_vgdisplay(output: &str) -> Result<Vec<VolumeGroup>, PalError> {
    let regex = VGDISPLAY_LINE
        .as_ref()
        .ok_or_else(|| PalError::InternalError("vgdisplay pattern failed to compile".into()))?;
    let mut groups: Vec<VolumeGroup> = Vec::new();
    for line in output.lines() {
        let Some(caps) = regex.captures(line) else {
            continue;
        };
        if let Some(vg) = caps.get(1) {
            groups.push(VolumeGroup {
                name: vg.as_str().to_string(),
                ..VolumeGroup::default()
            });
            continue;
        }
        let (Some(kind), Some(name)) = (caps.get(2), caps.get(3)) else {
            continue;
        };
        let Some(group) = groups.last_mut() else {
            return Err(PalError::InternalError(
                "vgdisplay -v returned corrupt data: LV or PV name encountered before its VG name".into(),
            ));
        };
        let name = name.as_str().trim_end().to_string();
        if kind.as_str() == "LV" {
            group.logical_volumes.push(name);
        } else {
            group.physical_volumes.push(name);
        }
    }
    Ok(groups)
}

/// Disk holding a physical volume: `disk3_p2` -> `disk3`, `c1t2d3s4` -> `c1t2d3`.
pub fn physical_volume_disk_name(pv: &str) -> &str {
    let name = file_name(pv);
    if name.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("disk")) {
        return name.rfind('_').map_or(name, |pos| &name[..pos]);
    }
    match name.rfind(|c: char| !c.is_ascii_digit()) {
        Some(pos) if name[pos..].starts_with('s') => &name[..pos],
        _ => name,
    }
}

/// Disks backing the HP-UX logical volume `device` (e.g. /dev/vg00/lvol3),
/// keyed by disk name. Disks without a raw device node are skipped.
pub fn hpux_physical_devices<D: DiskDepend + ?Sized>(
    deps: &D,
    device: &str,
) -> Result<BTreeMap<String, String>, PalError> {
    let output = deps.run(VGDISPLAY_COMMAND, "", LVM_QUERY_TIMEOUT)?;
    if output.status != 0 || !output.stderr.is_empty() {
        return Err(PalError::InternalError(format!(
            "execution of '{}' failed with return code {}: {}",
            VGDISPLAY_COMMAND,
            output.status,
            output.stderr.trim()
        )));
    }

    let mut devices = BTreeMap::new();
    let vg_dir = device.rsplit_once('/').map_or("", |(dir, _)| dir);
    let Some(group) = parse_vgdisplay(&output.stdout)?
        .into_iter()
        .find(|g| g.name == vg_dir)
    else {
        tracing::debug!(device = %device, "no volume group holds device");
        return Ok(devices);
    };

    for pv in &group.physical_volumes {
        let name = physical_volume_disk_name(pv);
        let dir = pv.rsplit_once('/').map_or("", |(dir, _)| dir);
        let path = format!("{}/{}", dir, name);
        let raw = if path.contains("/dsk/") {
            format!("/dev/rdsk/{}", name)
        } else {
            format!("/dev/rdisk/{}", name)
        };
        if deps.file_exists(&raw) {
            devices.insert(name.to_string(), path);
        } else {
            tracing::debug!(pv = %pv, raw = %raw, "no raw device for physical volume");
        }
    }
    Ok(devices)
}

/// Every disk perfstat reports except optical drives. AIX offers no cheap
/// mapping from a logical volume to its disks, so each mount yields them all.
pub fn aix_physical_devices<D: DiskDepend + ?Sized>(deps: &D) -> Result<BTreeMap<String, String>, PalError> {
    Ok(deps
        .perfstat_disk_names()?
        .into_iter()
        .filter(|name| !name.starts_with("cd"))
        .map(|name| {
            let device = format!("/dev/{}", name);
            (name, device)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VGDISPLAY: &str = "\
--- Volume groups ---
VG Name                     /dev/vg00
VG Write Access             read/write

   --- Logical volumes ---
   LV Name                     /dev/vg00/lvol1
   LV Status                   available/syncd
   LV Name                     /dev/vg00/lvol3

   --- Physical volumes ---
   PV Name                     /dev/disk/disk3_p2
   PV Status                   available

VG Name                     /dev/vgdata
   LV Name                     /dev/vgdata/lvdata
   PV Name                     /dev/dsk/c1t2d0s2
   PV Name                     /dev/dsk/c1t3d0
";

    #[test]
    fn vgdisplay_groups_volumes_under_their_group() {
        let groups = parse_vgdisplay(VGDISPLAY).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "/dev/vg00");
        assert_eq!(groups[0].logical_volumes, ["/dev/vg00/lvol1", "/dev/vg00/lvol3"]);
        assert_eq!(groups[0].physical_volumes, ["/dev/disk/disk3_p2"]);
        assert_eq!(groups[1].physical_volumes, ["/dev/dsk/c1t2d0s2", "/dev/dsk/c1t3d0"]);
    }

    #[test]
    fn volume_before_group_is_corrupt() {
        let err = parse_vgdisplay("   PV Name   /dev/disk/disk3\nVG Name /dev/vg00\n").unwrap_err();
        assert!(matches!(err, PalError::InternalError(_)));
    }

    #[test]
    fn unmatched_lines_are_ignored() {
        assert!(parse_vgdisplay("vgdisplay: no volume groups\n").unwrap().is_empty());
    }

    #[test]
    fn disk_name_drops_partition_suffix() {
        assert_eq!(physical_volume_disk_name("/dev/disk/disk3_p2"), "disk3");
        assert_eq!(physical_volume_disk_name("/dev/disk/disk7"), "disk7");
        assert_eq!(physical_volume_disk_name("/dev/dsk/c1t2d0s2"), "c1t2d0");
        assert_eq!(physical_volume_disk_name("/dev/dsk/c1t3d0"), "c1t3d0");
    }
}

use std::path::PathBuf;

use crate::config::MountPoint;

/// Rewrites `raw_path` through the first mount point it lies under.
/// Paths outside every mount point are returned unchanged.
pub fn mounted_path(raw_path: &str, mount_points: &[MountPoint]) -> PathBuf {
    mount_points
        .iter()
        .find_map(|mount_point| path_under_mount_point(raw_path, mount_point))
        .unwrap_or_else(|| PathBuf::from(raw_path))
}

fn path_under_mount_point(raw_path: &str, mount_point: &MountPoint) -> Option<PathBuf> {
    let windows = mount_point.original_platform_is_windows;
    let (path, root) = (
        PathComponents::parse(raw_path, windows),
        PathComponents::parse(&mount_point.original_path, windows),
    );
    if path.absolute != root.absolute || path.parts.len() < root.parts.len() {
        return None;
    }

    let matches = path.parts.iter().zip(&root.parts).all(|(part, prefix)| {
        if windows {
            part.eq_ignore_ascii_case(prefix)
        } else {
            part == prefix
        }
    });
    matches.then(|| {
        path.parts[root.parts.len()..]
            .iter()
            .fold(mount_point.mounted_path.clone(), |mounted, part| {
                mounted.join(part)
            })
    })
}

struct PathComponents<'a> {
    absolute: bool,
    parts: Vec<&'a str>,
}

impl<'a> PathComponents<'a> {
    fn parse(path: &'a str, windows: bool) -> Self {
        let separators: &[char] = if windows { &['\\', '/'] } else { &['/'] };
        Self {
            absolute: path.starts_with(separators),
            parts: path
                .split(separators)
                .filter(|part| !part.is_empty() && *part != ".")
                .collect(),
        }
    }
}

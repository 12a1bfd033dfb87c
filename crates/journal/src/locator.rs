use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use herald_protocol::{Category, Location, Mode};

use crate::Locator;

/// Kind of file kept under a location's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Journal,
    Sqlite,
    Log,
}

impl Layout {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Sqlite => "db",
            Self::Log => "log",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Journal => "journal",
            Self::Sqlite => "db",
            Self::Log => "log",
        }
    }
}

/// Filesystem locator: `<root>/<mode>/<category>/<group>/<name>/<layout>/`.
#[derive(Debug, Clone)]
pub struct DirLocator {
    root: PathBuf,
}

impl DirLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout_dir(&self, location: &Location, layout: Layout) -> PathBuf {
        self.root
            .join(location.mode.as_str())
            .join(location.category.as_str())
            .join(&location.group)
            .join(&location.name)
            .join(layout.dir_name())
    }
}

fn subdirs(path: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

impl Locator for DirLocator {
    fn list_locations(&self) -> Vec<Location> {
        let mut found = Vec::new();
        for mode in subdirs(&self.root) {
            let Ok(m) = mode.parse::<Mode>() else {
                continue;
            };
            let mode_dir = self.root.join(&mode);
            for category in subdirs(&mode_dir) {
                let Ok(c) = category.parse::<Category>() else {
                    continue;
                };
                let category_dir = mode_dir.join(&category);
                for group in subdirs(&category_dir) {
                    for name in subdirs(&category_dir.join(&group)) {
                        found.push(Location::new(m, c, group.clone(), name));
                    }
                }
            }
        }
        debug!(root = %self.root.display(), count = found.len(), "listed locations");
        found
    }

    /// Journal files are named `<dest uid hex>.<page>.journal`.
    fn list_location_dest(&self, location: &Location) -> Vec<u32> {
        let dir = self.layout_dir(location, Layout::Journal);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut dests: Vec<u32> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.ends_with(".journal"))
            .filter_map(|n| {
                n.split('.')
                    .next()
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            })
            .collect();
        dests.sort_unstable();
        dests.dedup();
        dests
    }

    fn layout_file(&self, location: &Location, layout: Layout, name: &str) -> PathBuf {
        self.layout_dir(location, layout)
            .join(format!("{name}.{}", layout.extension()))
    }
}

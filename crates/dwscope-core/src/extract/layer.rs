//! Warehouse layer detection from directory naming

use std::path::{Component, Path};
use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::Layer;

fn layer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[^a-zA-Z])(ADS|DWS|DWT|DWD|ODS)(?:$|[^a-zA-Z])").expect("layer regex")
    })
}

/// Layer tag bounded by non-letters anywhere in one path segment, so
/// `05-应用专题库-ADS` and `ods_raw` match while `loads` does not.
pub fn layer_from_segment(segment: &str) -> Option<Layer> {
    let caps = layer_re().captures(segment)?;
    caps[1].parse().ok()
}

/// Layer of `path`, checked segment by segment below `root` first and then
/// in the root's own components. The first matching segment wins.
pub fn detect_layer(root: &Path, path: &Path) -> Layer {
    let relative = path.strip_prefix(root).unwrap_or(path);
    normal_segments(relative)
        .chain(normal_segments(root))
        .find_map(layer_from_segment)
        .unwrap_or(Layer::Unknown)
}

fn normal_segments(path: &Path) -> impl Iterator<Item = &str> {
    path.components().filter_map(|component| match component {
        Component::Normal(part) => part.to_str(),
        _ => None,
    })
}

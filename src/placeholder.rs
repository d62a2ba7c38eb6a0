//! Placeholder values supplied to command and actionbar text.
//!
//! The engine only builds the substitution map; how markup, colors or
//! localization are rendered is up to the [`TextFormatter`].

use std::collections::BTreeMap;

use crate::host::ViewerInfo;

/// Key → value map, e.g. `viewer` → `"Steve"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard set for one session tick.
    pub fn for_tick(viewer: &ViewerInfo, scene: &str, tick: u64, duration: u64) -> Self {
        let progress = if duration == 0 {
            100
        } else {
            (tick.min(duration) * 100) / duration
        };
        let pos = &viewer.transform.position;

        let mut p = Self::new();
        p.set("viewer", viewer.name.clone());
        p.set("viewer_id", viewer.id.clone());
        p.set(
            "world",
            viewer.transform.world.clone().unwrap_or_default(),
        );
        p.set("x", format!("{:.2}", pos.x));
        p.set("y", format!("{:.2}", pos.y));
        p.set("z", format!("{:.2}", pos.z));
        p.set("scene", scene.to_string());
        p.set("tick", tick.to_string());
        p.set("duration", duration.to_string());
        p.set("progress", progress.to_string());
        p
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

pub trait TextFormatter: Send {
    fn format(&self, template: &str, values: &Placeholders) -> String;
}

/// Replaces `{key}` with its value; unknown keys are left untouched.
pub struct BraceFormatter;

impl TextFormatter for BraceFormatter {
    fn format(&self, template: &str, values: &Placeholders) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match values.get(key) {
                        Some(v) => out.push_str(v),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

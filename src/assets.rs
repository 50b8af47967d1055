//! Best-effort external services: name localization and emblem images.
//!
//! Both are per-item best-effort. A missing localization falls back to a
//! humanized key; a failed emblem fetch logs and leaves the entity without
//! an emblem. Neither can fail the pipeline.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::model::NameNode;

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$%]([\w.]+)[$%]").unwrap());
static KEY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(NAME_|EMPIRE_DESIGN_|SPEC_|LOC_)").unwrap());

/// Localization store interface. Implementations hand back the raw template
/// for a key; substitution happens here.
pub trait Localizer {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Fallback localizer with no store: every key is humanized in place.
#[derive(Debug, Default)]
pub struct KeyLocalizer;

impl Localizer for KeyLocalizer {
    fn lookup(&self, _key: &str) -> Option<String> {
        None
    }
}

impl Localizer for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolve a structured name: look up the key's template, then substitute
/// `$var$` / `%var%` slots from the node's variables (recursively).
pub fn localize_name(node: &NameNode, localizer: &dyn Localizer) -> String {
    if node.literal {
        return node.key.clone();
    }
    let template = localizer
        .lookup(&node.key)
        .unwrap_or_else(|| humanize_key(&node.key));

    VARIABLE_RE
        .replace_all(&template, |caps: &regex::Captures| {
            let slot = &caps[1];
            match node.variables.iter().find(|(key, _)| key == slot) {
                Some((_, value)) => localize_name(value, localizer),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn humanize_key(key: &str) -> String {
    let stripped = KEY_PREFIX_RE.replace(key, "");
    stripped.replace('_', " ").trim().to_string()
}

/// Emblem image provider. `None` means the fetch failed or the emblem does
/// not exist.
pub trait EmblemSource {
    fn fetch(&self, category: &str, file: &str) -> Option<Vec<u8>>;
}

/// Source with no emblems at all (headless runs).
#[derive(Debug, Default)]
pub struct NoEmblems;

impl EmblemSource for NoEmblems {
    fn fetch(&self, _category: &str, _file: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Filesystem-backed source: emblem images live at `<root>/<category>/<file>`.
#[derive(Debug)]
pub struct DirEmblems {
    root: PathBuf,
}

impl DirEmblems {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EmblemSource for DirEmblems {
    fn fetch(&self, category: &str, file: &str) -> Option<Vec<u8>> {
        std::fs::read(self.root.join(category).join(file)).ok()
    }
}

/// Data URI for a fetched emblem image, mime-typed from the file extension.
pub fn emblem_data_uri(file: &str, bytes: &[u8]) -> String {
    let extension = file.rsplit('.').next().map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("dds") => "image/vnd-ms.dds",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    format!("data:{mime};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// Get-or-fetch-and-store emblem cache, keyed `category/file`. Failures are
/// cached too, so a broken emblem is fetched (and warned about) once.
#[derive(Debug, Default)]
pub struct EmblemCache {
    entries: HashMap<String, Option<Vec<u8>>>,
}

impl EmblemCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch(
        &mut self,
        source: &dyn EmblemSource,
        category: &str,
        file: &str,
    ) -> Option<&[u8]> {
        let key = format!("{category}/{file}");
        let entry = self.entries.entry(key).or_insert_with(|| {
            let fetched = source.fetch(category, file);
            if fetched.is_none() {
                log::warn!("emblem fetch failed for {category}/{file}, omitting");
            }
            fetched
        });
        entry.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

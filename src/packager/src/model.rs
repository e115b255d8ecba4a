//! Build-request shapes and the manifest written into every package
//! (spec §4.10).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    FleetLinked,
    Standalone,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandaloneOptions {
    pub include_setup_wizard: bool,
    pub include_menubar: bool,
}

/// Embedded connection material. Only ever populated for `fleet_linked`
/// packages — a `standalone` build carries `None` and relies on its
/// first-run wizard to collect these interactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedCredentials {
    pub server_url: String,
    pub api_key: String,
    pub encryption_key_b64: String,
}

/// What the operator picked in the package-builder UI (spec §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSpec {
    pub variant: Variant,
    pub widgets: std::collections::HashMap<String, bool>,
    pub widget_order: Vec<String>,
    pub tools: std::collections::HashMap<String, bool>,
    pub tool_order: Vec<String>,
    #[serde(default)]
    pub standalone_options: StandaloneOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<EmbeddedCredentials>,
    #[serde(default)]
    pub autostart: bool,
}

impl BuildSpec {
    /// Widgets selected `true`, in `widget_order`'s sequence — entries in
    /// `widget_order` absent from `widgets` (or `false`) are dropped;
    /// entries in `widgets` absent from `widget_order` are appended in
    /// map-iteration order (best-effort; operators are expected to keep
    /// the two in sync).
    pub fn ordered_widgets(&self) -> Vec<String> {
        ordered_selection(&self.widgets, &self.widget_order)
    }

    pub fn ordered_tools(&self) -> Vec<String> {
        ordered_selection(&self.tools, &self.tool_order)
    }
}

fn ordered_selection(selected: &std::collections::HashMap<String, bool>, order: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in order {
        if selected.get(id).copied().unwrap_or(false) {
            out.push(id.clone());
            seen.insert(id.clone());
        }
    }
    for (id, enabled) in selected {
        if *enabled && !seen.contains(id) {
            out.push(id.clone());
        }
    }
    out
}

/// `manifest.json` at the package root — the only file the agent's
/// first-run logic and the built UI actually read back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub variant: Variant,
    pub widgets: Vec<String>,
    pub tools: Vec<String>,
    pub autostart: bool,
    pub standalone_options: Option<StandaloneOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<EmbeddedCredentials>,
}

impl Manifest {
    pub fn from_spec(spec: &BuildSpec) -> Self {
        Self {
            variant: spec.variant,
            widgets: spec.ordered_widgets(),
            tools: spec.ordered_tools(),
            autostart: spec.autostart,
            standalone_options: matches!(spec.variant, Variant::Standalone)
                .then(|| spec.standalone_options.clone()),
            credentials: spec.credentials.clone(),
        }
    }
}

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Options handed to `mermaid.initialize` inside the page.
///
/// The content is opaque to this crate: keys are forwarded as-is on top of a `startOnLoad: false`
/// default (see [`MermaidConfig::to_initialize_value`]).
#[derive(Debug, Clone, PartialEq)]
pub struct MermaidConfig(Value);

impl Default for MermaidConfig {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl MermaidConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        cur.as_str()
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // `from_value` accepts any JSON; coerce non-objects so this never panics on user input.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }

    /// The object passed to `mermaid.initialize`: `{startOnLoad: false, ...config}`.
    pub fn to_initialize_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("startOnLoad".to_string(), Value::Bool(false));
        let mut value = Value::Object(map);
        if self.0.is_object() {
            deep_merge_value(&mut value, &self.0);
        }
        value
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

pub const DEFAULT_RENDERER_SCRIPT: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.min.js";

/// Where the shell page loads `mermaid.min.js` from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererScript {
    /// Local file, copied next to the shell page.
    File(PathBuf),
    /// Referenced directly from the `<script src>`.
    Url(String),
}

impl Default for RendererScript {
    fn default() -> Self {
        Self::Url(DEFAULT_RENDERER_SCRIPT.to_string())
    }
}

impl RendererScript {
    /// Anything with a URL scheme (`https:`, `file:` ...) is a URL; everything else is a path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(parsed) if parsed.scheme().len() > 1 => Self::Url(raw.to_string()),
            _ => Self::File(PathBuf::from(raw)),
        }
    }
}

impl<'de> Deserialize<'de> for RendererScript {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Browser launch settings, loadable from a JSON file with camelCase keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserConfig {
    pub executable_path: Option<PathBuf>,
    pub headless: bool,
    /// Extra command-line flags appended after the fixed portability flags.
    pub args: Vec<String>,
    pub window_width: u32,
    pub window_height: u32,
    pub idle_timeout_secs: u64,
    pub renderer_script: RendererScript,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            args: Vec::new(),
            window_width: 800,
            window_height: 600,
            idle_timeout_secs: 300,
            renderer_script: RendererScript::default(),
        }
    }
}

impl BrowserConfig {
    /// Sandboxing is disabled so the browser starts inside containers and CI runners.
    pub const PORTABLE_ARGS: [&'static str; 4] = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-gpu",
        "--disable-dev-shm-usage",
    ];

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Fixed portability flags followed by the user's extra flags.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Self::PORTABLE_ARGS.iter().map(|a| a.to_string()).collect();
        for arg in &self.args {
            if !args.contains(arg) {
                args.push(arg.clone());
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_value_defaults_start_on_load_off() {
        let cfg = MermaidConfig::from_value(json!({"theme": "dark"}));
        assert_eq!(
            cfg.to_initialize_value(),
            json!({"startOnLoad": false, "theme": "dark"})
        );
    }

    #[test]
    fn initialize_value_keeps_user_start_on_load() {
        let cfg = MermaidConfig::from_value(json!({"startOnLoad": true, "theme": "dark"}));
        let value = cfg.to_initialize_value();
        assert_eq!(value["startOnLoad"], json!(true));
        assert_eq!(value["theme"], json!("dark"));
    }

    #[test]
    fn initialize_value_ignores_non_object_config() {
        let cfg = MermaidConfig::from_value(json!([1, 2]));
        assert_eq!(cfg.to_initialize_value(), json!({"startOnLoad": false}));
    }

    #[test]
    fn set_value_creates_nested_objects() {
        let mut cfg = MermaidConfig::empty_object();
        cfg.set_value("flowchart.htmlLabels", json!(false));
        cfg.set_value("theme", json!("forest"));
        assert_eq!(cfg.as_value()["flowchart"]["htmlLabels"], json!(false));
        assert_eq!(cfg.get_str("theme"), Some("forest"));
    }

    #[test]
    fn deep_merge_keeps_unrelated_keys() {
        let mut cfg = MermaidConfig::from_value(json!({"flowchart": {"curve": "basis"}}));
        cfg.deep_merge(&json!({"flowchart": {"htmlLabels": true}, "theme": "neutral"}));
        assert_eq!(
            cfg.as_value(),
            &json!({"flowchart": {"curve": "basis", "htmlLabels": true}, "theme": "neutral"})
        );
    }

    #[test]
    fn renderer_script_distinguishes_urls_from_paths() {
        assert_eq!(
            RendererScript::parse("https://example.com/mermaid.min.js"),
            RendererScript::Url("https://example.com/mermaid.min.js".to_string())
        );
        assert_eq!(
            RendererScript::parse("vendor/mermaid.min.js"),
            RendererScript::File(PathBuf::from("vendor/mermaid.min.js"))
        );
        assert_eq!(
            RendererScript::parse(r"C:\js\mermaid.min.js"),
            RendererScript::File(PathBuf::from(r"C:\js\mermaid.min.js"))
        );
    }

    #[test]
    fn browser_config_reads_camel_case_json() {
        let cfg = BrowserConfig::from_json_str(
            r#"{"executablePath": "/usr/bin/chromium", "args": ["--lang=en", "--no-sandbox"], "rendererScript": "./m.js"}"#,
        )
        .unwrap();
        assert_eq!(cfg.executable_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(cfg.headless);
        assert_eq!(
            cfg.renderer_script,
            RendererScript::File(PathBuf::from("./m.js"))
        );
        let args = cfg.launch_args();
        assert_eq!(args.iter().filter(|a| *a == "--no-sandbox").count(), 1);
        assert_eq!(args.last().map(String::as_str), Some("--lang=en"));
    }
}

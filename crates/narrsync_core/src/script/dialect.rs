//! How segment markers and hold instructions look in a program.

use crate::config::ScriptSettings;

/// Marker and hold conventions of the visual program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDialect {
    /// Line prefix (after indentation) that starts a segment block.
    pub marker_prefix: String,
    /// Hold instruction with a `{seconds}` placeholder.
    pub hold_template: String,
    /// Tag appended as a trailing comment to every inserted hold.
    pub hold_tag: String,
}

impl Default for ScriptDialect {
    fn default() -> Self {
        Self::from(&ScriptSettings::default())
    }
}

impl From<&ScriptSettings> for ScriptDialect {
    fn from(settings: &ScriptSettings) -> Self {
        Self {
            marker_prefix: settings.marker_prefix.clone(),
            hold_template: settings.hold_template.clone(),
            hold_tag: settings.hold_tag.clone(),
        }
    }
}

impl ScriptDialect {
    pub fn is_marker(&self, line: &str) -> bool {
        line.trim_start().starts_with(&self.marker_prefix)
    }

    /// Whether `line` is a hold this engine inserted.
    pub fn is_hold(&self, line: &str) -> bool {
        line.contains(&self.hold_tag)
    }

    /// Hold instruction text for `seconds` (without indent or tag).
    pub fn render_hold(&self, seconds: f64) -> String {
        self.hold_template
            .replace("{seconds}", &format_seconds(seconds))
    }

    /// Full hold line: indent, instruction and trailing tag comment.
    pub fn hold_line(&self, indent: &str, seconds: f64) -> String {
        format!("{}{}  # {}", indent, self.render_hold(seconds), self.hold_tag)
    }
}

/// Seconds with millisecond precision and no redundant trailing zeros.
///
/// `2.0` -> `"2.0"`, `2.23` -> `"2.23"`, `0.7604` -> `"0.76"`.
pub fn format_seconds(seconds: f64) -> String {
    let fixed = format!("{:.3}", seconds);
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Whether a hold of `seconds` is still positive after formatting.
pub fn is_expressible_hold(seconds: f64) -> bool {
    seconds.is_finite() && seconds > 0.0 && format_seconds(seconds) != "0.0"
}

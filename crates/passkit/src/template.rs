//! Descriptor templating.
//!
//! Pass descriptor templates carry placeholder tokens for the values that
//! differ between issuers. [`render`] substitutes every occurrence from a
//! [`PassConfig`] and validates the result, so an unconfigured placeholder
//! fails at build time rather than surfacing on a shipped pass.
//!
//! Templating runs before the build pipeline; [`crate::PassBuilder`] only
//! ever sees the finished descriptor bytes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Placeholder for the issuer's team identifier.
pub const TEAM_ID_TOKEN: &str = "YOUR_TEAM_ID";

/// Placeholder for the pass type identifier.
pub const PASS_TYPE_ID_TOKEN: &str = "YOUR_PASS_TYPE_ID";

/// Placeholder for the issuing organization's display name.
pub const ORGANIZATION_TOKEN: &str = "YOUR_ORGANIZATION";

const TOKENS: [&str; 3] = [TEAM_ID_TOKEN, PASS_TYPE_ID_TOKEN, ORGANIZATION_TOKEN];

/// Issuer values substituted into a descriptor template.
///
/// Serde field names follow the descriptor's own vocabulary, so a config
/// can be loaded from a JSON file shaped like the descriptor itself:
///
/// ```
/// use passkit::template::PassConfig;
///
/// let config: PassConfig = serde_json::from_str(
///     r#"{
///         "teamIdentifier": "A1B2C3D4E5",
///         "passTypeIdentifier": "pass.com.example.event",
///         "organizationName": "Example Corp"
///     }"#,
/// )?;
/// assert_eq!(config.team_identifier, "A1B2C3D4E5");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassConfig {
    /// Apple Developer team identifier (e.g. `A1B2C3D4E5`).
    pub team_identifier: String,
    /// Reverse-DNS pass type identifier (e.g. `pass.com.example.event`).
    pub pass_type_identifier: String,
    /// Organization name shown to pass holders.
    pub organization_name: String,
}

impl PassConfig {
    /// Create a config from the three issuer values.
    pub fn new(
        team_identifier: impl Into<String>,
        pass_type_identifier: impl Into<String>,
        organization_name: impl Into<String>,
    ) -> Self {
        Self {
            team_identifier: team_identifier.into(),
            pass_type_identifier: pass_type_identifier.into(),
            organization_name: organization_name.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("team identifier", &self.team_identifier),
            ("pass type identifier", &self.pass_type_identifier),
            ("organization name", &self.organization_name),
        ];

        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Missing {} in pass configuration",
                    label
                )));
            }
            if TOKENS.iter().any(|token| value.contains(token)) {
                return Err(Error::Config(format!(
                    "Placeholder value for {} in pass configuration",
                    label
                )));
            }
        }

        Ok(())
    }
}

/// Render a descriptor template with the configured issuer values.
///
/// Replaces every occurrence of each placeholder token and leaves all
/// other bytes untouched. The template must be UTF-8 and the rendered
/// result must parse as JSON.
///
/// # Errors
///
/// Returns [`Error::Config`] if:
/// - A config value is empty or still a placeholder
/// - The template is not UTF-8 text
/// - A placeholder token survives rendering
/// - The rendered descriptor does not parse as JSON
pub fn render(template: &[u8], config: &PassConfig) -> Result<Vec<u8>> {
    config.validate()?;

    let text = std::str::from_utf8(template)
        .map_err(|_| Error::Config("Descriptor template is not valid UTF-8".into()))?;

    let rendered = text
        .replace(TEAM_ID_TOKEN, &config.team_identifier)
        .replace(PASS_TYPE_ID_TOKEN, &config.pass_type_identifier)
        .replace(ORGANIZATION_TOKEN, &config.organization_name);

    if let Some(token) = find_placeholder(&rendered) {
        return Err(Error::Config(format!(
            "Placeholder {} remains after rendering",
            token
        )));
    }

    serde_json::from_str::<serde_json::Value>(&rendered)
        .map_err(|e| Error::Config(format!("Rendered descriptor is not valid JSON: {}", e)))?;

    Ok(rendered.into_bytes())
}

/// Return the first placeholder token present in `text`, if any.
pub fn find_placeholder(text: &str) -> Option<&'static str> {
    TOKENS.into_iter().find(|token| text.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"{
  "teamIdentifier": "YOUR_TEAM_ID",
  "passTypeIdentifier": "YOUR_PASS_TYPE_ID",
  "organizationName": "YOUR_ORGANIZATION",
  "description": "YOUR_ORGANIZATION event ticket",
  "serialNumber": "123"
}"#;

    fn test_config() -> PassConfig {
        PassConfig::new("TEAM123456", "pass.com.example.event", "Acme")
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let rendered = render(TEMPLATE.as_bytes(), &test_config()).unwrap();
        let text = String::from_utf8(rendered).unwrap();

        assert!(!text.contains("YOUR_"));
        assert!(text.contains("\"teamIdentifier\": \"TEAM123456\""));
        assert!(text.contains("\"passTypeIdentifier\": \"pass.com.example.event\""));
        // ORGANIZATION appears twice in the template
        assert_eq!(text.matches("Acme").count(), 2);
    }

    #[test]
    fn test_render_leaves_other_bytes_untouched() {
        let rendered = render(TEMPLATE.as_bytes(), &test_config()).unwrap();
        let expected = TEMPLATE
            .replace("YOUR_TEAM_ID", "TEAM123456")
            .replace("YOUR_PASS_TYPE_ID", "pass.com.example.event")
            .replace("YOUR_ORGANIZATION", "Acme");

        assert_eq!(rendered, expected.into_bytes());
    }

    #[test]
    fn test_render_without_placeholders_passes_through() {
        let template = b"{\"serialNumber\":\"123\"}";
        let rendered = render(template, &test_config()).unwrap();
        assert_eq!(rendered, template);
    }

    #[test]
    fn test_render_rejects_non_utf8_template() {
        let result = render(&[0xff, 0xfe, 0x00], &test_config());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_render_rejects_non_json_result() {
        // Bare token renders to an unquoted value
        let template = b"{\"teamIdentifier\": YOUR_TEAM_ID}";
        let result = render(template, &test_config());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_render_rejects_empty_config_value() {
        let config = PassConfig::new("", "pass.com.example.event", "Acme");
        let result = render(TEMPLATE.as_bytes(), &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_render_rejects_placeholder_config_value() {
        let config = PassConfig::new("YOUR_TEAM_ID", "pass.com.example.event", "Acme");
        let result = render(TEMPLATE.as_bytes(), &config);

        assert!(result.is_err());
        if let Err(Error::Config(msg)) = result {
            assert!(msg.contains("Placeholder"));
        }
    }

    #[test]
    fn test_find_placeholder() {
        assert_eq!(
            find_placeholder("team is YOUR_TEAM_ID"),
            Some(TEAM_ID_TOKEN)
        );
        assert_eq!(find_placeholder("nothing here"), None);
    }

    #[test]
    fn test_config_from_descriptor_style_json() {
        let config: PassConfig = serde_json::from_str(
            r#"{
                "teamIdentifier": "TEAM123456",
                "passTypeIdentifier": "pass.com.example.event",
                "organizationName": "Acme"
            }"#,
        )
        .unwrap();

        assert_eq!(config, test_config());
    }
}

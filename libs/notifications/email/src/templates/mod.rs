//! Handlebars-based email templates
//!
//! Templates are registered at engine construction time. Each template has a
//! subject plus optional text and HTML bodies, all rendered against the same
//! JSON data object.

use crate::error::{NotificationError, NotificationResult};
use handlebars::Handlebars;
use serde_json::Value;
use std::collections::HashMap;

/// Rendered template result
#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

/// Email template definition
#[derive(Clone, Debug)]
pub struct EmailTemplate {
    pub name: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
}

/// Handlebars template engine
///
/// Supports variables (`{{name}}`), conditionals (`{{#if}}`), loops
/// (`{{#each}}`), and raw HTML via `{{{unescaped}}}`.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, EmailTemplate>,
}

impl TemplateEngine {
    /// Create a new engine with the default templates registered
    pub fn new() -> NotificationResult<Self> {
        let mut engine = Self {
            handlebars: Handlebars::new(),
            templates: HashMap::new(),
        };

        engine.register_defaults()?;

        Ok(engine)
    }

    /// Register a template
    pub fn register(&mut self, template: EmailTemplate) -> NotificationResult<()> {
        self.handlebars
            .register_template_string(&format!("{}_subject", template.name), &template.subject)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        if let Some(text) = &template.body_text {
            self.handlebars
                .register_template_string(&format!("{}_text", template.name), text)
                .map_err(|e| NotificationError::TemplateError(e.to_string()))?;
        }

        if let Some(html) = &template.body_html {
            self.handlebars
                .register_template_string(&format!("{}_html", template.name), html)
                .map_err(|e| NotificationError::TemplateError(e.to_string()))?;
        }

        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Render a template by name
    pub fn render(&self, name: &str, data: &Value) -> NotificationResult<RenderedTemplate> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| NotificationError::TemplateError(format!("template not found: {name}")))?;

        let subject = self
            .handlebars
            .render(&format!("{name}_subject"), data)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        let body_text = if template.body_text.is_some() {
            Some(
                self.handlebars
                    .render(&format!("{name}_text"), data)
                    .map_err(|e| NotificationError::TemplateError(e.to_string()))?,
            )
        } else {
            None
        };

        let body_html = if template.body_html.is_some() {
            Some(
                self.handlebars
                    .render(&format!("{name}_html"), data)
                    .map_err(|e| NotificationError::TemplateError(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(RenderedTemplate {
            subject,
            body_text,
            body_html,
        })
    }

    /// Check if a template exists
    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// List all registered templates
    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.keys().map(|s| s.as_str()).collect()
    }

    fn register_defaults(&mut self) -> NotificationResult<()> {
        // Welcome email
        self.register(EmailTemplate {
            name: "welcome".to_string(),
            subject: "Welcome to {{app_name}}, {{name}}!".to_string(),
            body_text: Some(
                r#"Hello {{name}},

Welcome to {{app_name}}!

We're excited to have you on board.

Best regards,
The {{app_name}} Team"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Welcome, {{name}}!</h1>
    <p>Thank you for joining <strong>{{app_name}}</strong>.</p>
    <p>We're excited to have you on board.</p>
    <p>Best regards,<br>The {{app_name}} Team</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        // Password reset
        self.register(EmailTemplate {
            name: "password_reset".to_string(),
            subject: "Password Reset Request".to_string(),
            body_text: Some(
                r#"Hello {{name}},

We received a request to reset your password.

Click the link below to reset your password:

{{reset_link}}

This link will expire in {{expiry_minutes}} minutes.

If you didn't request this, please ignore this email. Your password will remain unchanged.

Best regards,
The {{app_name}} Team"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Password Reset</h1>
    <p>Hello {{name}},</p>
    <p>We received a request to reset your password.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{{reset_link}}"
           style="background-color: #dc2626; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block;">
            Reset Password
        </a>
    </p>
    <p style="color: #666; font-size: 14px;">This link will expire in {{expiry_minutes}} minutes.</p>
    <p style="color: #666; font-size: 14px;">If you didn't request this, please ignore this email. Your password will remain unchanged.</p>
    <p>Best regards,<br>The {{app_name}} Team</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        // Password changed confirmation
        self.register(EmailTemplate {
            name: "password_changed".to_string(),
            subject: "Your password has been changed".to_string(),
            body_text: Some(
                r#"Hello {{name}},

Your password was changed successfully.

If you did not make this change, please contact support immediately.

Best regards,
The {{app_name}} Team"#
                    .to_string(),
            ),
            body_html: Some(
                r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1 style="color: #2563eb;">Password Changed</h1>
    <p>Hello {{name}},</p>
    <p>Your password was changed successfully.</p>
    <p style="color: #666; font-size: 14px;">If you did not make this change, please contact support immediately.</p>
    <p>Best regards,<br>The {{app_name}} Team</p>
</body>
</html>"#
                    .to_string(),
            ),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_templates_are_registered() {
        let engine = TemplateEngine::new().unwrap();
        assert!(engine.has_template("welcome"));
        assert!(engine.has_template("password_reset"));
        assert!(engine.has_template("password_changed"));
        assert!(!engine.has_template("missing"));
    }

    #[test]
    fn renders_welcome_with_variables() {
        let engine = TemplateEngine::new().unwrap();
        let rendered = engine
            .render("welcome", &json!({"name": "Alice", "app_name": "Bazaar"}))
            .unwrap();

        assert_eq!(rendered.subject, "Welcome to Bazaar, Alice!");
        assert!(rendered.body_text.unwrap().contains("Alice"));
        assert!(rendered.body_html.unwrap().contains("Bazaar"));
    }

    #[test]
    fn renders_password_reset_link() {
        let engine = TemplateEngine::new().unwrap();
        let rendered = engine
            .render(
                "password_reset",
                &json!({
                    "name": "Bob",
                    "app_name": "Bazaar",
                    "reset_link": "https://example.com/reset-password/abc123",
                    "expiry_minutes": 15,
                }),
            )
            .unwrap();

        let text = rendered.body_text.unwrap();
        assert!(text.contains("https://example.com/reset-password/abc123"));
        assert!(text.contains("15 minutes"));
    }

    #[test]
    fn render_unknown_template_fails() {
        let engine = TemplateEngine::new().unwrap();
        let err = engine.render("missing", &json!({})).unwrap_err();
        assert!(matches!(err, NotificationError::TemplateError(_)));
    }

    #[test]
    fn registering_custom_template_works() {
        let mut engine = TemplateEngine::new().unwrap();
        engine
            .register(EmailTemplate {
                name: "order_shipped".to_string(),
                subject: "Order {{order_id}} shipped".to_string(),
                body_text: Some("Your order {{order_id}} is on its way.".to_string()),
                body_html: None,
            })
            .unwrap();

        let rendered = engine
            .render("order_shipped", &json!({"order_id": "42"}))
            .unwrap();
        assert_eq!(rendered.subject, "Order 42 shipped");
        assert!(rendered.body_html.is_none());
    }
}

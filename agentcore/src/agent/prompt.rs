//! The system-prompt provider interface (§6) and the placeholder rewrite
//! applied before handing a template to the configured templating engine
//! (whichever concrete engine a deployment wires in — out of scope here).

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

use super::context::RunContext;

/// Supplies the system instruction for a run, with optional templating.
#[async_trait]
pub trait SystemPromptProvider: Send + Sync {
    /// Produce the system prompt for `ctx`. Errors fall back to a constant
    /// prompt at the call site rather than failing the run (resolving the
    /// instruction is not itself on the fatal-error path in §4.5).
    async fn get_prompt(&self, ctx: &RunContext) -> Result<String>;
}

/// The fallback used when no `SystemPromptProvider` is configured, or one
/// is configured but its `get_prompt` call fails.
pub const FALLBACK_INSTRUCTION: &str = "You are a helpful assistant.";

/// Rewrite recognized `{{name}}` placeholders to `{{ .name }}` before
/// handing the template to a templating engine that expects the latter
/// form (the common convention among the Go-style template engines this
/// spec's `runContext`-keyed substitution is modeled on).
#[must_use]
pub fn rewrite_placeholders(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();

    while let Some((i, ch)) = chars.next() {
        if ch == '{' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = template[i..].find("}}") {
                let inner = &template[i + 2..i + end];
                if !inner.trim().is_empty() && !inner.trim_start().starts_with('.') {
                    out.push_str("{{ .");
                    out.push_str(inner.trim());
                    out.push_str(" }}");
                } else {
                    out.push_str(&template[i..i + end + 2]);
                }
                for _ in 0..(end + 1) {
                    chars.next();
                }
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Resolve the system instruction for a run: call the provider if one is
/// configured, falling back to [`FALLBACK_INSTRUCTION`] on absence or
/// error.
pub async fn resolve_instruction(
    provider: Option<&dyn SystemPromptProvider>,
    ctx: &RunContext,
) -> String {
    let Some(provider) = provider else {
        return FALLBACK_INSTRUCTION.to_string();
    };

    match provider.get_prompt(ctx).await {
        Ok(prompt) => rewrite_placeholders(&prompt),
        Err(err) => {
            warn!(error = %err, "system prompt provider failed, using fallback instruction");
            FALLBACK_INSTRUCTION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::rewrite_placeholders;

    #[test]
    fn rewrites_bare_placeholders() {
        assert_eq!(rewrite_placeholders("hi {{name}}"), "hi {{ .name }}");
    }

    #[test]
    fn leaves_already_dotted_placeholders_alone() {
        assert_eq!(
            rewrite_placeholders("hi {{ .name }}"),
            "hi {{ .name }}"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(rewrite_placeholders("no placeholders here"), "no placeholders here");
    }
}

//! Classification prompt construction
//!
//! The schema section of the prompt is rendered once per builder; only the
//! observation text changes between requests.

use crate::models::schema::{FieldKind, Schema};

/// Fully-specified request for one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub prompt: String,
}

/// Builds [`ClassificationRequest`]s for a fixed schema
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    preamble: String,
}

impl RequestBuilder {
    pub fn new(schema: &Schema) -> Self {
        Self {
            preamble: render_preamble(schema),
        }
    }

    /// Embed `text` verbatim after the schema section
    pub fn build(&self, text: &str) -> ClassificationRequest {
        let mut prompt = String::with_capacity(self.preamble.len() + text.len() + 96);
        prompt.push_str(&self.preamble);
        prompt.push_str("**Observation Text to Analyze:**\n---\n");
        prompt.push_str(text);
        prompt.push_str("\n---\n\nRespond with only the JSON object.\n");
        ClassificationRequest { prompt }
    }
}

fn render_preamble(schema: &Schema) -> String {
    let mut out = format!(
        "You are an expert FDA regulatory and compliance analyst. {}\n\n",
        schema.instructions
    );

    out.push_str("**Fields:**\n");
    for field in &schema.fields {
        out.push_str(&format!("- **{}:** {}", field.name, field.description));
        if let FieldKind::Text { allowed } = &field.kind {
            if !allowed.is_empty() {
                out.push_str(&format!(" One of: {}.", allowed.join(", ")));
            }
        }
        out.push('\n');
    }

    out.push_str(
        "\n**Instructions:**\n\
         1. Analyze the complete observation text provided below.\n\
         2. Populate every field listed above.\n\
         3. You MUST respond with a single valid JSON object only, with no additional text or \
         explanations before or after the JSON.\n\n",
    );

    out.push_str("**JSON Output Format:**\n");
    out.push_str(&render_output_shape(schema));
    out.push_str("\n\n");

    out
}

/// Example object in the exact shape the parser expects
fn render_output_shape(schema: &Schema) -> String {
    let indent = if schema.envelope.is_some() { "    " } else { "  " };

    let lines: Vec<String> = schema
        .fields
        .iter()
        .map(|field| {
            let placeholder = match &field.kind {
                FieldKind::Flag => "true/false".to_string(),
                FieldKind::Text { allowed } if !allowed.is_empty() => {
                    format!("\"{}\"", allowed.join(" | "))
                }
                FieldKind::Text { .. } => "\"...\"".to_string(),
            };
            format!("{}\"{}\": {}", indent, field.name, placeholder)
        })
        .collect();
    let body = lines.join(",\n");

    match &schema.envelope {
        Some(envelope) => format!("{{\n  \"{}\": {{\n{}\n  }}\n}}", envelope, body),
        None => format!("{{\n{}\n}}", body),
    }
}

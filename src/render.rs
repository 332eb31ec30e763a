//! Schema validation and template compilation for the renderer

use jsonschema::{error::ValidationErrorKind, JSONSchema};
use serde_json::{Map, Value};

use crate::ejs;
use crate::error::{ApiError, ApiResult};
use crate::types::{OutputFormat, RenderRequest, TemplateEngine};

/// Compile a template's JSON schema, rejecting anything that is not a valid schema object.
pub fn compile_schema(schema: &Value) -> ApiResult<JSONSchema> {
    if !schema.is_object() {
        return Err(ApiError::improper_payload(
            "The template schema must be a JSON object",
        ));
    }
    JSONSchema::compile(schema)
        .map_err(|e| ApiError::improper_payload(format!("The template schema is invalid: {e}")))
}

/// Check `data` against `schema`, describing the first violation.
pub fn validate_data(schema: &Value, data: &Value) -> ApiResult<()> {
    let compiled = compile_schema(schema)?;

    let message = match compiled.validate(data) {
        Ok(()) => return Ok(()),
        Err(mut errors) => match errors.next() {
            Some(error) => {
                let path = field_path(&error.instance_path.to_string());
                let addendum = match &error.kind {
                    ValidationErrorKind::Enum { options } => allowed_values(options),
                    _ => String::new(),
                };
                format!(
                    "The data provided was insufficient to render the presentation using the specified template: the '{path}' field {error}{addendum}"
                )
            }
            None => return Ok(()),
        },
    };

    tracing::warn!("Validation of render data failed: {}", message);
    Err(ApiError::precondition(message))
}

/// `/course/title` becomes `data.course.title`
fn field_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(String::from("data"), |mut path, segment| {
            path.push('.');
            path.push_str(segment);
            path
        })
}

fn allowed_values(options: &Value) -> String {
    match options.as_array() {
        Some(values) => {
            let values: Vec<String> = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            format!(" ({})", values.join(", "))
        }
        None => String::new(),
    }
}

/// Fill `data` into `template` with the named engine.
pub fn compile(
    template: &str,
    data: &Map<String, Value>,
    engine: TemplateEngine,
    output: OutputFormat,
) -> ApiResult<String> {
    match (engine, output) {
        (TemplateEngine::Ejs, OutputFormat::Htm) => ejs::render(template, data),
    }
}

/// Validate (when the template carries a schema) and then compile.
pub fn render(request: &RenderRequest) -> ApiResult<String> {
    if let Some(schema) = &request.template.schema {
        tracing::debug!("Validating render data against template schema");
        validate_data(schema, &Value::Object(request.data.clone()))?;
    }

    let rendered = compile(
        &request.template.template,
        &request.data,
        request.template.renderer,
        request.output,
    )?;
    tracing::debug!("Rendered {} bytes", rendered.len());
    Ok(rendered)
}

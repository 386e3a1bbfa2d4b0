use std::collections::BTreeMap;
use validator::ValidationErrors;

// Field name -> user-facing messages, ordered by field for stable output.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub fn collect_field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut collected = FieldErrors::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => error.code.to_string(),
            })
            .collect();
        collected.insert(field.to_string(), messages);
    }
    collected
}

pub fn add_field_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

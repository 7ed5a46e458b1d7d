//! Input validation for subscription requests.

use grapnel_core::{validate_bounded_object, JsonBounds, NotificationType, SourceSystem};
use serde_json::Value as JsonValue;

use crate::error::NotificationError;

/// Validate a webhook delivery URL: `http://` or `https://` with a host.
pub fn validate_webhook_url(url: &str) -> Result<(), NotificationError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(NotificationError::InvalidUrl(
            "Webhook URL must start with http:// or https://".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|e| NotificationError::InvalidUrl(format!("Invalid URL format: {e}")))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(NotificationError::InvalidUrl("URL must have a host".to_string()));
    }
    Ok(())
}

/// Parse a partner system id.
pub fn parse_system_id(raw: &str) -> Result<SourceSystem, NotificationError> {
    raw.parse()
        .map_err(|e: grapnel_core::ParseEnumError| NotificationError::Validation(e.to_string()))
}

/// Parse requested notification types; `None` means every type.
pub fn parse_notification_types(
    raw: Option<&[String]>,
) -> Result<Vec<NotificationType>, NotificationError> {
    let Some(raw) = raw else {
        return Ok(NotificationType::ALL.to_vec());
    };
    if raw.is_empty() {
        return Err(NotificationError::Validation(
            "notification_types must not be empty".to_string(),
        ));
    }

    let mut types = Vec::with_capacity(raw.len());
    for value in raw {
        let parsed: NotificationType = value
            .parse()
            .map_err(|e: grapnel_core::ParseEnumError| NotificationError::Validation(e.to_string()))?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }
    Ok(types)
}

/// Validate subscription filters; `None` becomes an empty object.
pub fn validate_filters(filters: Option<JsonValue>) -> Result<JsonValue, NotificationError> {
    match filters {
        None | Some(JsonValue::Null) => Ok(JsonValue::Object(serde_json::Map::new())),
        Some(value) => {
            validate_bounded_object(&value, &JsonBounds::default())
                .map_err(|e| NotificationError::Validation(format!("filters: {e}")))?;
            Ok(value)
        }
    }
}

/// True when every required field is present and not blank.
pub fn check_body(fields: &[Option<&str>]) -> bool {
    fields
        .iter()
        .all(|field| matches!(field, Some(value) if !value.trim().is_empty()))
}

/// Validate latitude and longitude coordinates
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("Invalid latitude: {}. Must be between -90 and 90", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("Invalid longitude: {}. Must be between -180 and 180", lon));
    }
    Ok(())
}

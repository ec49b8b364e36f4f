use std::path::Path;

use unic_langid::LanguageIdentifier;

/// Validate that a source file exists and is a regular file
pub fn validate_file_path(path: &str) -> Result<(), String> {
    let path_obj = Path::new(path);

    if !path_obj.exists() {
        return Err(format!("File does not exist: {}", path));
    }

    if !path_obj.is_file() {
        return Err(format!("Path is not a file: {}", path));
    }

    Ok(())
}

/// Validate a locale code as used by the CDS (`pt_BR` and `pt-BR` both accepted)
pub fn validate_locale_code(locale: &str) -> Result<(), String> {
    if locale.trim().is_empty() {
        return Err("Locale code cannot be empty".to_string());
    }

    if locale.contains(['/', '\\']) || locale.starts_with('.') {
        return Err(format!("Invalid locale code: {}", locale));
    }

    locale
        .replace('_', "-")
        .parse::<LanguageIdentifier>()
        .map(|_| ())
        .map_err(|_| {
            format!(
                "Invalid locale code: {}. Expected a BCP 47 language identifier",
                locale
            )
        })
}

/// Validate that the output directory exists or can be created
pub fn validate_output_dir(path: &Path) -> Result<(), String> {
    if path.exists() && !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("Cannot create output directory {}: {}", path.display(), e))
}

/// Split comma-separated values, accepting repeated flags as well
pub fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

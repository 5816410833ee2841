use std::path::Path;

/// Package names from an nvm-style `default-packages` file: one per line,
/// blank lines and `#` comments ignored. A missing or unreadable file means
/// there is nothing to enforce.
pub fn load_default_packages(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_default_packages(&content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no default packages file");
            Vec::new()
        }
    }
}

pub fn parse_default_packages(content: &str) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !packages.iter().any(|p| p == line) {
            packages.push(line.to_string());
        }
    }
    packages
}

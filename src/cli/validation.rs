//! CLI argument validation functions
//!
//! Value parsers for arguments that clap cannot check by type alone.

use std::fs;
use std::path::PathBuf;

/// Validate port number is within valid range (1-65535)
pub fn validate_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str.parse().map_err(|_| {
        format!("Port must be a valid number between 1 and 65535, got: '{port_str}'")
    })?;

    if port == 0 {
        return Err("Port must be between 1 and 65535. Port 0 is not allowed.".to_string());
    }

    Ok(port)
}

/// Validate that a configuration file exists and can be opened
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(format!("Configuration file does not exist: '{path_str}'"));
    }

    fs::File::open(&path)
        .map(|_| path)
        .map_err(|e| format!("Cannot read configuration file '{path_str}': {e}"))
}

/// Validate host address format (basic validation)
pub fn validate_host_address(host_str: &str) -> Result<String, String> {
    let host = host_str.trim();

    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }

    if host.contains(char::is_whitespace) {
        return Err("Host address cannot contain spaces".to_string());
    }

    // Dotted digits must be a full IPv4 address
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') && host.parse::<std::net::Ipv4Addr>().is_err() {
        return Err(format!("Invalid IPv4 address format: '{host_str}'"));
    }

    if host.len() > 253 {
        return Err("Host address is too long (maximum 253 characters)".to_string());
    }

    Ok(host.to_string())
}

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// Validate a hostname for use as a directory name.
/// Allows alphanumeric, hyphens, dots, and underscores. No path separators or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 || hostname == "." || hostname == ".." {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Make an inventory name safe to use as a single path component
pub fn safe_path_component(name: &str) -> String {
    if is_valid_hostname(name) {
        return name.to_string();
    }
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' { c } else { '_' })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

/// Session timeout in milliseconds, as libssh2 takes it
pub fn timeout_millis(timeout_secs: u64) -> Result<u32, String> {
    u32::try_from(timeout_secs)
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
        .ok_or_else(|| format!("SSH timeout of {}s is too large", timeout_secs))
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// Returns the authenticated Session. Uses the ssh2 crate (libssh2).
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(host: &str, port: u16, user: &str, pass: &str, timeout_secs: u64) -> Result<ssh2::Session, String> {
    let timeout_ms = timeout_millis(timeout_secs)?;
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("Invalid address {}:{}: {}", host, port, e))?
        .next()
        .ok_or_else(|| format!("No address found for {}:{}", host, port))?;

    let tcp = TcpStream::connect_timeout(&addr, Duration::from_secs(timeout_secs))
        .map_err(|e| format!("TCP connection failed: {}", e))?;

    tcp.set_read_timeout(Some(Duration::from_secs(timeout_secs)))
        .ok();
    tcp.set_write_timeout(Some(Duration::from_secs(timeout_secs)))
        .ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout_ms);
    session.handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    // Try password auth first
    match session.userauth_password(user, pass) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // Try keyboard-interactive auth (needed for Arista EOS and similar)
    let mut prompter = PasswordPrompt { password: pass.to_string() };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err("SSH authentication failed: all methods exhausted".to_string())
    }
}

/// Run a single command on an open session, returning the raw output.
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_exec(session: &ssh2::Session, command: &str) -> Result<String, String> {
    let mut channel = session.channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;

    channel.exec(command)
        .map_err(|e| format!("Failed to execute command: {}", e))?;

    let mut output = String::new();
    channel.read_to_string(&mut output)
        .map_err(|e| format!("Failed to read output: {}", e))?;

    channel.wait_close()
        .map_err(|e| format!("Failed to close channel: {}", e))?;

    Ok(output)
}

/// True when the device rejected the command rather than running it
pub fn is_cli_rejection(output: &str) -> bool {
    let trimmed = output.trim_start();
    trimmed.starts_with("% Invalid")
        || trimmed.starts_with("% Incomplete")
        || trimmed.starts_with("% Unrecognized")
        || trimmed.contains("Invalid input detected")
        || trimmed.starts_with("syntax error")
        || trimmed.starts_with("unknown command")
        || trimmed.starts_with("error: syntax error")
        || trimmed.starts_with("error: unknown command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_hostname() {
        assert!(is_valid_hostname("switch-01"));
        assert!(is_valid_hostname("router.lab.local"));
        assert!(is_valid_hostname("my_host"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("host name")); // spaces
        assert!(!is_valid_hostname("host;rm")); // semicolon
        assert!(!is_valid_hostname("../etc/passwd")); // path traversal
        assert!(!is_valid_hostname("..")); // parent dir
        assert!(!is_valid_hostname("host\nname")); // newline
    }

    #[test]
    fn test_safe_path_component() {
        assert_eq!(safe_path_component("r1.lab"), "r1.lab");
        assert_eq!(safe_path_component("site/r1"), "site_r1");
        assert_eq!(safe_path_component("../etc"), ".._etc");
        assert_eq!(safe_path_component(".."), "__");
        assert_eq!(safe_path_component(""), "_");
    }

    #[test]
    fn test_timeout_millis() {
        assert_eq!(timeout_millis(30), Ok(30_000));
        assert_eq!(timeout_millis(4_294_967), Ok(4_294_967_000));
        assert!(timeout_millis(4_294_968).is_err());
        assert!(timeout_millis(u64::MAX).is_err());
    }

    #[test]
    fn test_is_cli_rejection() {
        assert!(is_cli_rejection("% Invalid input detected at '^' marker."));
        assert!(is_cli_rejection("\n% Incomplete command."));
        assert!(is_cli_rejection("syntax error, expecting <command>."));
        assert!(is_cli_rejection("\nerror: syntax error, expecting <command>: ethernet-switching\n"));
        assert!(is_cli_rejection("error: unknown command: optics"));
        assert!(!is_cli_rejection("Cisco IOS Software, Version 15.2"));
        assert!(!is_cli_rejection("hostname r1\n% comment inside config"));
    }
}

/// The voice server went away; the transport resumes on its own.
pub const VOICE_SERVER_CRASHED: u16 = 4015;

/// Whether a disconnect with `code` is transient and needs no teardown.
pub fn is_resumable(code: u16) -> bool {
    code == VOICE_SERVER_CRASHED
}

/// Human readable description of a voice gateway close code.
pub fn describe(code: u16) -> &'static str {
    match code {
        1000 => "Normal closure",
        1006 => "Abnormal closure",
        4001 => "Unknown opcode",
        4002 => "Failed to decode payload",
        4003 => "Not authenticated",
        4004 => "Authentication failed",
        4005 => "Already authenticated",
        4006 => "Session no longer valid",
        4009 => "Session timeout",
        4011 => "Server not found",
        4012 => "Unknown protocol",
        4014 => "Disconnected",
        4015 => "Voice server crashed",
        4016 => "Unknown encryption mode",
        4017 => "E2EE/DAVE protocol required",
        4020 => "Bad request",
        4021 => "Disconnected: rate limited",
        4022 => "Disconnected: call terminated",
        _ => "Unknown close code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_crash_is_resumable() {
        assert!(is_resumable(4015));
        assert!(!is_resumable(4014));
        assert!(!is_resumable(4006));
    }

    #[test]
    fn describes_known_and_unknown_codes() {
        assert_eq!(describe(4014), "Disconnected");
        assert_eq!(describe(4999), "Unknown close code");
    }
}

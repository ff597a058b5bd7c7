const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Build facts shown at startup, filled in by the build script.
pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

impl BannerInfo {
    pub fn commit_short(&self) -> &str {
        self.commit.get(..7).unwrap_or(self.commit)
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!();
    println!("{GREEN}  _ __ ___  ___  ___  _ __   ___   __| | ___ {RESET}");
    println!("{GREEN} | '__/ _ \\/ __|/ _ \\| '_ \\ / _ \\ / _` |/ _ \\{RESET}");
    println!("{GREEN} | | |  __/\\__ \\ (_) | | | | (_) | (_| |  __/{RESET}");
    println!("{GREEN} |_|  \\___||___/\\___/|_| |_|\\___/ \\__,_|\\___|{RESET}");
    println!("{DIM}============================================{RESET}");
    println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit_short(), RESET);
    print_row("Profile", info.profile, RESET);
    println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {BOLD}{label:<10}{RESET}{color}{value}{RESET}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_commit_tolerates_unknown() {
        let mut info = BannerInfo::default();
        info.commit = "0123456789abcdef";
        assert_eq!(info.commit_short(), "0123456");
        info.commit = "unknown";
        assert_eq!(info.commit_short(), "unknown");
    }
}

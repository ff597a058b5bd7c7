use serde::Serialize;

/// Body of `GET /v4/info`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub version: Version,
    pub build_time: u64,
    pub git: GitInfo,
    pub runtime: String,
    pub source_managers: Vec<String>,
    pub filters: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub semver: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_release: Option<String>,
}

impl Version {
    /// Parses a `major.minor.patch[-pre]` string; missing parts read as 0.
    pub fn parse(semver: &str) -> Self {
        let (core, pre_release) = match semver.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (semver, None),
        };
        let mut parts = core.split('.').map(|p| p.parse().unwrap_or(0));

        Self {
            semver: semver.to_string(),
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
            pre_release,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub branch: String,
    pub commit: String,
    pub commit_time: u64,
}

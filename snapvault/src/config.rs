//! Destinations configuration file
//!
//! ```yaml
//! destinations:
//!   - name: storage
//!     host: nas.local
//!     share: Photos
//!     username: photographer
//!     password: ${NAS_PASSWORD}
//!     base_path: Photoshoots
//! notify:
//!   webhook_url: ${DISCORD_WEBHOOK_URL}
//! ```
//!
//! `$VAR` and `${VAR}` references in credentials, hosts, mount points and the webhook URL are
//! expanded from the environment; unknown variables expand to an empty string. The key
//! `smb_shares` is accepted in place of `destinations`.

use crate::Error;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default, alias = "smb_shares")]
    pub destinations: Vec<DestinationConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NotifyConfig {
    /// Discord-compatible webhook receiving start/finish notifications
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// One remote target every discovered file is copied to.
#[derive(Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct DestinationConfig {
    /// Name used in logs, reports and `--destination`; defaults to `host/share`
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    /// 0 or missing means the default port
    #[serde(default)]
    pub port: Option<u16>,
    pub share: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// Directory inside the share that receives the organizing folders
    #[serde(default)]
    pub base_path: String,
    /// Local directory the host's shares are mounted under
    #[serde(default)]
    pub mount_point: Option<std::path::PathBuf>,
}

impl DestinationConfig {
    #[must_use]
    pub fn id(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}/{}", self.host, self.share),
        }
    }
    #[must_use]
    pub fn target(&self) -> remote::Target {
        remote::Target {
            host: self.host.clone(),
            port: self
                .port
                .filter(|port| *port != 0)
                .unwrap_or(remote::DEFAULT_PORT),
            share: self.share.clone(),
            credentials: remote::Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
                domain: self.domain.clone(),
            },
            mount_point: self.mount_point.clone(),
        }
    }
    fn expand(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        self.host = expand_vars(&self.host, lookup);
        self.username = expand_vars(&self.username, lookup);
        self.password = expand_vars(&self.password, lookup);
        if let Some(mount_point) = &self.mount_point {
            self.mount_point = Some(expand_vars(&mount_point.to_string_lossy(), lookup).into());
        }
    }
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("share", &self.share)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("base_path", &self.base_path)
            .field("mount_point", &self.mount_point)
            .finish()
    }
}

/// Expand `$NAME` and `${NAME}` references using `lookup`.
///
/// A `$` that does not start a reference is kept as is.
pub fn expand_vars(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('$') {
        expanded.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                expanded.push_str(&lookup(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len > 0 {
                expanded.push_str(&lookup(&after[..len]).unwrap_or_default());
                rest = &after[len..];
                continue;
            }
        }
        expanded.push('$');
        rest = after;
    }
    expanded.push_str(rest);
    expanded
}

impl Config {
    /// Read and parse the configuration file, expanding variables from the environment.
    pub async fn load(path: &std::path::Path) -> Result<Self, Error> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::parse_with(text, &|name| std::env::var(name).ok())
    }

    /// Parse with a custom variable lookup.
    pub fn parse_with(text: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config: Config = serde_yaml::from_str(text)?;
        for destination in &mut config.destinations {
            destination.expand(lookup);
        }
        config.notify.webhook_url = config
            .notify
            .webhook_url
            .map(|url| expand_vars(&url, lookup))
            .filter(|url| !url.is_empty());
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let mut seen = std::collections::HashSet::new();
        for (index, destination) in self.destinations.iter().enumerate() {
            if destination.host.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "destination {index} has no host"
                )));
            }
            if destination.share.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "destination {index} ({}) has no share",
                    destination.host
                )));
            }
            if !seen.insert(destination.id()) {
                return Err(Error::InvalidConfig(format!(
                    "destination name {:?} is used more than once",
                    destination.id()
                )));
            }
        }
        Ok(())
    }

    /// Destinations named in `names`, in configuration order; all of them when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<DestinationConfig>, Error> {
        if names.is_empty() {
            return Ok(self.destinations.clone());
        }
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.destinations.iter().any(|dest| &dest.id() == *name))
        {
            return Err(Error::InvalidConfig(format!(
                "unknown destination {unknown:?}"
            )));
        }
        Ok(self
            .destinations
            .iter()
            .filter(|dest| names.contains(&dest.id()))
            .cloned()
            .collect())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Destination of forwarded envelopes, e.g. `localhost:3457`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentAddress {
    pub host: String,
    pub port: u16,
}

impl AgentAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for AgentAddress {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let Some((host, port)) = value.rsplit_once(':') else {
            return Err(format!("'{value}' is not in host:port form"));
        };

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(format!("'{value}' has an empty host"));
        }

        let port: u16 = port
            .parse()
            .map_err(|e| format!("'{value}' has an invalid port: {e}"))?;
        if port == 0 {
            return Err(format!("'{value}' has port 0"));
        }

        Ok(Self::new(host, port))
    }
}

/// Parses an interval given either as whole seconds (`60`) or with a unit
/// suffix (`500ms`, `5s`, `2m`, `1h`).
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("'{value}' is not a duration"))?;
    let (number, unit) = value.split_at(split);
    let number: u64 = number
        .parse()
        .map_err(|_| format!("'{value}' is not a duration"))?;

    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(number.saturating_mul(60)),
        "h" => Duration::from_secs(number.saturating_mul(3600)),
        _ => {
            return Err(format!(
                "'{value}' has unknown unit '{unit}' (expected ms, s, m or h)"
            ));
        }
    };
    Ok(duration)
}

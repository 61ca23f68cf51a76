/// UA policy hook deciding whether an origin may open picture-in-picture windows

use crate::Result;
use url::{Origin, Url};

#[derive(Debug, Clone, PartialEq)]
pub enum PermissionDecision {
    Granted,
    Denied(String),
}

pub trait PermissionPolicy: Send + Sync {
    fn check(&self, origin: &Origin) -> PermissionDecision;
}

/// Grants every request that carries user activation
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn check(&self, _origin: &Origin) -> PermissionDecision {
        PermissionDecision::Granted
    }
}

/// Denies a fixed set of origins (site settings, enterprise policy)
pub struct DenyOrigins {
    denied: Vec<Origin>,
}

impl DenyOrigins {
    pub fn from_urls(urls: &[&str]) -> Result<Self> {
        let denied = urls
            .iter()
            .map(|u| Url::parse(u).map(|u| u.origin()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(DenyOrigins { denied })
    }
}

impl PermissionPolicy for DenyOrigins {
    fn check(&self, origin: &Origin) -> PermissionDecision {
        if self.denied.contains(origin) {
            PermissionDecision::Denied(format!(
                "picture-in-picture is blocked for {}",
                origin.ascii_serialization()
            ))
        } else {
            PermissionDecision::Granted
        }
    }
}

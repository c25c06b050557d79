use crate::zk::{Acl, parse_acls};
use std::time::Duration;

/// Store configuration.
///
/// Built by the embedding resource manager from its own configuration
/// surface; only the knobs the store engine consumes live here.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Coordination service address, e.g. `"host1:2181,host2:2181"`.
    pub address: String,

    /// Session timeout. Also bounds how long an operation blocks waiting for
    /// a live session before failing.
    pub session_timeout: Duration,

    /// Maximum attempts for connection establishment and for transient
    /// operation failures.
    pub num_retries: u32,

    /// Root path under which the store namespace is created.
    pub working_path: String,

    /// ACL attached to every node the store creates.
    pub acl: Vec<Acl>,
}

impl StoreConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            session_timeout: Duration::from_secs(10),
            num_retries: 3,
            working_path: "/rmstore".to_string(),
            acl: vec![Acl::world_anyone()],
        }
    }

    /// Set the session timeout
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the retry bound
    pub fn num_retries(mut self, retries: u32) -> Self {
        self.num_retries = retries;
        self
    }

    /// Set the namespace root path
    pub fn working_path(mut self, path: &str) -> Self {
        self.working_path = path.to_string();
        self
    }

    /// Set the node ACL
    pub fn acl(mut self, acl: Vec<Acl>) -> Self {
        self.acl = acl;
        self
    }

    /// Set the node ACL from a spec string such as `"world:anyone:rwcda"`
    pub fn acl_spec(mut self, spec: &str) -> Result<Self, String> {
        self.acl = parse_acls(spec)?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.address.is_empty() {
            return Err("coordination service address cannot be empty".to_string());
        }
        if self.num_retries == 0 {
            return Err("num_retries must be > 0".to_string());
        }
        if !self.working_path.starts_with('/') || self.working_path.len() < 2 {
            return Err("working_path must be an absolute path".to_string());
        }
        if self.working_path.ends_with('/') {
            return Err("working_path must not end with '/'".to_string());
        }
        if self.acl.is_empty() {
            return Err("at least one ACL entry is required".to_string());
        }
        Ok(())
    }
}

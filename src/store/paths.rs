//! The node-path namespace. No other module builds path strings.

/// Name of the store's root node under the working path.
pub const ROOT_NODE_NAME: &str = "RMStateRoot";

/// Name of the application root under the store root.
pub const APP_ROOT_NAME: &str = "RMAppRoot";

/// Name of the secret-manager root under the store root.
pub const SECRET_ROOT_NAME: &str = "RMDTSecretManagerRoot";

pub const DELEGATION_KEY_PREFIX: &str = "DelegationKey_";
pub const DELEGATION_TOKEN_PREFIX: &str = "RMDelegationToken_";
pub const DT_SEQUENCE_NUMBER_PREFIX: &str = "RMDTSequenceNumber_";

pub fn node_path(root: &str, name: &str) -> String {
    format!("{root}/{name}")
}

/// Precomputed namespace roots for one store instance.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: String,
    pub app_root: String,
    pub secret_root: String,
}

impl StorePaths {
    pub fn new(working_path: &str) -> Self {
        let root = node_path(working_path, ROOT_NODE_NAME);
        let app_root = node_path(&root, APP_ROOT_NAME);
        let secret_root = node_path(&root, SECRET_ROOT_NAME);
        Self {
            root,
            app_root,
            secret_root,
        }
    }

    pub fn app_node(&self, name: &str) -> String {
        node_path(&self.app_root, name)
    }

    pub fn secret_node(&self, name: &str) -> String {
        node_path(&self.secret_root, name)
    }

    pub fn delegation_key_name(key_id: i32) -> String {
        format!("{DELEGATION_KEY_PREFIX}{key_id}")
    }

    pub fn delegation_token_name(sequence_number: u64) -> String {
        format!("{DELEGATION_TOKEN_PREFIX}{sequence_number}")
    }

    pub fn sequence_number_name(sequence_number: u64) -> String {
        format!("{DT_SEQUENCE_NUMBER_PREFIX}{sequence_number}")
    }

    /// Parse the sequence number out of a marker node name.
    pub fn parse_sequence_number(name: &str) -> Option<u64> {
        name.strip_prefix(DT_SEQUENCE_NUMBER_PREFIX)?.parse().ok()
    }
}

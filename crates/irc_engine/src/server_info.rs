//! The one piece of configuration the engine itself owns; everything
//! upstream of it (parsing a config file into a `ServerInfo`) belongs to the
//! excluded CLI/config-file collaborator.

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub addr: String,
    pub port: u16,
    pub tls: bool,
    pub pass: Option<String>,
    pub realname: String,
    /// Nicks to try in order; the literal value `"auto"` as the sole entry
    /// means "generate one".
    pub nicks: Vec<String>,
    pub auto_join: Vec<String>,
}

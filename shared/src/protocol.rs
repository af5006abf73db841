/// Header line of the server list format served to clients and checkpointed to disk
pub const CSV_HEADER: &str = "name,ip,port,mode";

/// Query sent to a server's beacon port to request a status report
pub const REPORT_QUERY: &[u8] = b"REPORT";

/// Servers run their beacon on the game port plus this offset unless told otherwise
pub const BEACON_PORT_OFFSET: u16 = 1000;

/// HTTP paths
pub const SERVERS_PATH: &str = "/servers";
pub const SERVERS_ALL_PATH: &str = "/servers/all";
pub const SERVERS_DEBUG_PATH: &str = "/servers/debug";
pub const SERVERS_ADD_PATH: &str = "/servers/add";
pub const SERVERS_HASH_PATH: &str = "/servers/hash";
pub const SERVERS_STATUS_PATH: &str = "/servers/status";
pub const ADD_SERVER_FORM_PATH: &str = "/add-server";

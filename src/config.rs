/// Static credentials echoed into login frames and reply payloads. Where
/// they come from is the operator's business.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub passphrase: String,
    pub sign: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway endpoint as a `ws://` URL; its query names the venue endpoint
    /// the gateway should dial.
    pub gateway_url: String,
    pub channel: String,
    pub inst_type: String,
    /// Optional instrument filter; empty means not sent.
    pub inst_id: String,
    /// Parallel connection workers racing for the same feed.
    pub workers: usize,
    /// true: leave the socket blocking and park in `recv`.
    /// false: non-blocking reads that spin, trading CPU for latency.
    pub wait_on_socket: bool,
    /// Mask client frames with the fixed key.
    pub use_mask: bool,
    pub credentials: Credentials,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            gateway_url: String::from("ws://127.0.0.1:9999/?url=wss://ws.okx.com:8443/ws/v5/private"),
            channel: String::from("orders"),
            inst_type: String::from("ANY"),
            inst_id: String::new(),
            workers: 1,
            wait_on_socket: false,
            use_mask: true,
            credentials: Credentials::default(),
        }
    }
}

//! Server descriptor and session data types

/// Default HTTP port for GameStream hosts
pub const DEFAULT_HTTP_PORT: u16 = 47989;
/// Default HTTPS port, used when the server omits `HttpsPort`
pub const DEFAULT_HTTPS_PORT: u16 = 47984;

/// Oldest GFE major version the protocol supports
pub const MIN_SUPPORTED_GFE_VERSION: i32 = 3;
/// Newest GFE major version the protocol supports
pub const MAX_SUPPORTED_GFE_VERSION: i32 = 7;

/// Durable descriptor for a single GameStream host
///
/// Created by [`crate::GameStreamClient::init`], then mutated by
/// `load_server_status`, `pair`, `start_app` and `quit_app`. All fields are
/// owned values; downstream consumers copy what they need at the boundary.
#[derive(Debug, Clone, Default)]
pub struct ServerData {
    /// Host name or IP address (without port)
    pub address: String,
    /// HTTP port, parsed from the caller-supplied address
    pub http_port: u16,
    /// HTTPS port; zero until learned from `serverinfo`
    pub https_port: u16,
    /// Whether the last completed handshake with this server succeeded
    pub paired: bool,
    /// Currently running app id; zero when idle
    pub current_game: i32,
    /// Raw `appversion` string reported by the server
    pub app_version: String,
    /// Major component of `app_version`
    pub server_major_version: i32,
    /// Raw `GfeVersion` string
    pub gfe_version: String,
    /// Raw `GsVersion` string
    pub gs_version: String,
    /// Server host name
    pub hostname: String,
    /// Server MAC address
    pub mac: String,
    /// GPU model string
    pub gpu_type: String,
    /// Codec support bitmask (`ServerCodecModeSupport`)
    pub server_codec_mode_support: i32,
    /// RTSP session URL, filled by a successful launch or resume
    pub rtsp_session_url: Option<String>,
}

impl ServerData {
    /// Create a descriptor for `address` before any server contact
    #[must_use]
    pub fn new(address: impl Into<String>, http_port: u16) -> Self {
        Self {
            address: address.into(),
            http_port,
            ..Self::default()
        }
    }

    /// Whether the server advertises any modern codec mode (proxy for 4K)
    #[must_use]
    pub fn supports_4k(&self) -> bool {
        self.server_codec_mode_support != 0
    }

    /// Whether this host is Sunshine rather than GFE
    ///
    /// Sunshine reports a negative fourth component in its version quad.
    #[must_use]
    pub fn is_sunshine(&self) -> bool {
        version_quad(&self.app_version)[3] < 0
    }
}

/// Parse a dotted version string into four components, zero-filling
/// whatever is missing
///
/// Matches `strtol` semantics: each component is the leading integer of its
/// segment, so suffixed segments like `431rc1` still parse.
pub(crate) fn version_quad(version: &str) -> [i32; 4] {
    let mut quad = [0i32; 4];
    for (slot, segment) in quad.iter_mut().zip(version.split('.')) {
        *slot = leading_int(segment);
    }
    quad
}

fn leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    s[..end].parse().unwrap_or(0)
}

/// A single entry from the server's application list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    /// Server-assigned application id
    pub id: i32,
    /// Display name
    pub title: String,
    /// Whether the app advertises HDR support
    pub hdr_supported: bool,
}

/// Audio channel layout requested for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioConfiguration {
    /// Two-channel stereo
    #[default]
    Stereo,
    /// 5.1 surround
    Surround51,
}

impl AudioConfiguration {
    /// Number of channels carried on the wire
    #[must_use]
    pub fn channel_count(self) -> i32 {
        match self {
            Self::Stereo => 2,
            Self::Surround51 => 6,
        }
    }

    /// Channel mask for the `surroundAudioInfo` launch parameter
    #[must_use]
    pub fn channel_mask(self) -> i32 {
        match self {
            Self::Stereo => 0x3,
            Self::Surround51 => 0xFC,
        }
    }
}

/// Caller-provided stream parameters
///
/// `start_app` writes a fresh remote-input AES key into the configuration;
/// everything else is read-only input.
#[derive(Debug, Clone)]
pub struct StreamConfiguration {
    /// Stream width in pixels
    pub width: i32,
    /// Stream height in pixels
    pub height: i32,
    /// Requested frame rate
    pub fps: i32,
    /// Audio channel layout
    pub audio: AudioConfiguration,
    /// Remote-input AES key, written once by `start_app`
    pub remote_input_aes_key: [u8; 16],
}

impl StreamConfiguration {
    /// Create a configuration for the given mode
    #[must_use]
    pub fn new(width: i32, height: i32, fps: i32, audio: AudioConfiguration) -> Self {
        Self {
            width,
            height,
            fps,
            audio,
            remote_input_aes_key: [0u8; 16],
        }
    }
}

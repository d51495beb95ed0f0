//! Protocol orchestrator: pairing and session lifecycle
//!
//! Drives the XML-over-HTTP(S) GameStream control protocol against a GFE or
//! Sunshine host: server discovery with the mandatory HTTPS→HTTP fallback,
//! the five-stage cryptographic pairing handshake, app listing, box art,
//! launch/resume and cancel.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::blob::Blob;
use crate::crypto::{self, ClientIdentity};
use crate::error::{GsError, Result};
use crate::net::{GsHttpClient, RequestClient, Timeout};
use crate::server::{
    DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, MAX_SUPPORTED_GFE_VERSION, MIN_SUPPORTED_GFE_VERSION,
    AppEntry, ServerData, StreamConfiguration, version_quad,
};
use crate::xml;

#[cfg(test)]
mod tests;

/// Stable 16-hex-character install id sent as `uniqueid` on every request
///
/// The server keys its per-client pairing state on this value, so it must
/// not change for the lifetime of the process.
const UNIQUE_ID: &str = "0123456789ABCDEF";

/// Device name advertised during pairing
const DEVICE_NAME: &str = "roth";

/// Client for the GameStream pairing and session-lifecycle protocol
///
/// Generic over the [`RequestClient`] transport so tests can drive the
/// protocol without a network. All operations are async and complete (or
/// time out) without spawning background tasks; callers serialize
/// operations against the same server themselves.
pub struct GameStreamClient<C = GsHttpClient> {
    http: C,
    identity: ClientIdentity,
    launch_url_extra: String,
}

impl GameStreamClient<GsHttpClient> {
    /// Create a client backed by the real HTTP transport
    ///
    /// Loads the client identity from `key_dir`, generating and persisting
    /// a fresh one on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be loaded or generated, or
    /// the TLS transport cannot be configured from it.
    pub fn new(key_dir: &Path) -> Result<Self> {
        let identity = ClientIdentity::load_or_generate(key_dir)?;
        let http = GsHttpClient::new(&identity)?;
        Ok(Self::with_transport(http, identity))
    }
}

impl<C: RequestClient> GameStreamClient<C> {
    /// Create a client over a caller-supplied transport
    #[must_use]
    pub fn with_transport(http: C, identity: ClientIdentity) -> Self {
        Self {
            http,
            identity,
            launch_url_extra: String::new(),
        }
    }

    /// Opaque query-string suffix appended verbatim to launch and resume
    /// URLs (supplied by the downstream streaming library)
    pub fn set_launch_url_extra(&mut self, extra: impl Into<String>) {
        self.launch_url_extra = extra.into();
    }

    /// The client identity used for pairing and mutual TLS
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// The underlying transport
    #[must_use]
    pub fn transport(&self) -> &C {
        &self.http
    }

    /// Resolve `address` (`host[:port]`) and fetch the server's state
    ///
    /// # Errors
    ///
    /// Propagates any failure from [`Self::load_server_status`], or fails
    /// on an unparseable port.
    pub async fn init(&self, address: &str) -> Result<ServerData> {
        let (host, http_port) = match address.split_once(':') {
            Some((host, port_text)) => {
                let port = port_text.parse().map_err(|_| {
                    GsError::failed(format!("invalid port in address: {address}"))
                })?;
                (host, port)
            }
            None => (address, DEFAULT_HTTP_PORT),
        };

        let mut server = ServerData::new(host, http_port);
        self.load_server_status(&mut server).await?;
        Ok(server)
    }

    /// Refresh the server descriptor from `serverinfo`
    ///
    /// Learns the HTTPS port over HTTP first if unknown, then queries over
    /// HTTPS (authoritative for pairing status, but refused for unpaired
    /// clients on modern GFE) with an HTTP fallback. At most three
    /// exchanges.
    ///
    /// # Errors
    ///
    /// Returns the last transport or parse error if both attempts fail,
    /// or [`GsError::UnsupportedVersion`] when the server version is
    /// outside the supported band.
    pub async fn load_server_status(&self, server: &mut ServerData) -> Result<()> {
        // Without a known HTTPS port the HTTPS path cannot be attempted.
        if server.https_port == 0 {
            self.load_serverinfo(server, false).await?;
        }

        let mut result = self.load_serverinfo(server, true).await;
        if let Err(err) = &result {
            debug!("HTTPS serverinfo failed ({err}), falling back to HTTP");
            result = self.load_serverinfo(server, false).await;
        }
        result?;

        if server.server_major_version > MAX_SUPPORTED_GFE_VERSION {
            return Err(GsError::UnsupportedVersion {
                message: "Ensure you're running the latest client version or downgrade \
                          GeForce Experience and try again"
                    .into(),
            });
        }
        if server.server_major_version < MIN_SUPPORTED_GFE_VERSION {
            return Err(GsError::UnsupportedVersion {
                message: "This server requires a newer version of GeForce Experience. \
                          Please upgrade GFE on your PC and try again"
                    .into(),
            });
        }

        Ok(())
    }

    async fn load_serverinfo(&self, server: &mut ServerData, https: bool) -> Result<()> {
        let url = if https {
            format!(
                "https://{}:{}/serverinfo?uniqueid={UNIQUE_ID}",
                server.address, server.https_port
            )
        } else {
            format!(
                "http://{}:{}/serverinfo?uniqueid={UNIQUE_ID}",
                server.address, server.http_port
            )
        };

        let data = self.http.get(&url, Timeout::Low).await?;
        xml::status(&data)?;

        let current_game = xml::search(&data, "currentgame")?;
        let pair_status = xml::search(&data, "PairStatus")?;
        let app_version = xml::search(&data, "appversion")?;
        let state = xml::search(&data, "state")?;
        // Host-dependent extras: GFE never sends Sunshine-only elements
        // like GsVersion, so absence is not an error.
        let codec_support = xml::search_opt(&data, "ServerCodecModeSupport")?.unwrap_or_default();
        let gpu_type = xml::search_opt(&data, "gputype")?.unwrap_or_default();
        let gs_version = xml::search_opt(&data, "GsVersion")?.unwrap_or_default();
        let hostname = xml::search_opt(&data, "hostname")?.unwrap_or_default();
        let gfe_version = xml::search_opt(&data, "GfeVersion")?.unwrap_or_default();
        let https_port = xml::search_opt(&data, "HttpsPort")?.unwrap_or_default();
        let mac = xml::search_opt(&data, "mac")?.unwrap_or_default();

        // These four are present on every supported server generation.
        if current_game.is_empty()
            || pair_status.is_empty()
            || app_version.is_empty()
            || state.is_empty()
        {
            return Err(GsError::InvalidResponse {
                message: "serverinfo response is missing required fields".into(),
            });
        }

        server.paired = pair_status == "1";
        server.current_game = current_game.trim().parse().unwrap_or(0);
        server.server_major_version = version_quad(&app_version)[0];
        server.app_version = app_version;
        server.server_codec_mode_support = codec_support.trim().parse().unwrap_or(0);
        server.gpu_type = gpu_type;
        server.gs_version = gs_version;
        server.hostname = hostname;
        server.gfe_version = gfe_version;
        server.mac = mac;
        server.https_port = https_port.trim().parse().unwrap_or(0);
        if server.https_port == 0 {
            server.https_port = DEFAULT_HTTPS_PORT;
        }

        // After GFE 2.8, currentgame remains set even once streaming has
        // ended; emulate the old behavior by forcing it to zero.
        if state == "_SERVER_BUSY" {
            server.current_game = 0;
        }

        Ok(())
    }

    /// Execute the five-stage pairing handshake with a user-entered PIN
    ///
    /// On success `server.paired` becomes true. On any stage failure a
    /// best-effort `unpair` clears partial server-side state and the
    /// original error is propagated.
    ///
    /// # Errors
    ///
    /// [`GsError::WrongState`] when already paired or a game is running;
    /// [`GsError::Failed`] with "MITM attack detected" when the server's
    /// pairing secret does not verify against its own certificate; any
    /// transport or parse error from the individual stages.
    pub async fn pair(&self, server: &mut ServerData, pin: &str) -> Result<()> {
        if server.paired {
            return Err(GsError::WrongState {
                message: "Already paired".into(),
            });
        }
        if server.current_game != 0 {
            return Err(GsError::WrongState {
                message: "The computer is currently in a game. You must close the game \
                          before pairing"
                    .into(),
            });
        }

        info!(
            generation = server.server_major_version,
            "pairing with server"
        );

        match self.pair_stages(server, pin).await {
            Ok(()) => {
                server.paired = true;
                Ok(())
            }
            Err(err) => {
                // Clear partial server-side pairing state; a cleanup
                // failure must not mask the original error.
                if let Err(cleanup) = self.unpair(server).await {
                    debug!("cleanup unpair failed: {cleanup}");
                }
                Err(err)
            }
        }
    }

    async fn pair_stages(&self, server: &ServerData, pin: &str) -> Result<()> {
        // Gen 7 servers derive the AES key and challenge hashes with
        // SHA-256; older generations use SHA-1.
        let sha256_mode = server.server_major_version >= 7;
        let hash_len = if sha256_mode { 32 } else { 20 };
        let hash = |input: &Blob| {
            if sha256_mode {
                crypto::sha256(input)
            } else {
                crypto::sha1(input)
            }
        };
        let pair_url = |params: &str| {
            format!(
                "http://{}:{}/pair?uniqueid={UNIQUE_ID}&devicename={DEVICE_NAME}&updateState=1&{params}",
                server.address, server.http_port
            )
        };

        info!("pairing stage #1: getservercert");
        let salt = Blob::random(16);
        let salted_pin = salt.append(&Blob::from(pin));

        let url = pair_url(&format!(
            "phrase=getservercert&salt={}&clientcert={}",
            salt.hex_string(),
            self.identity.cert_pem().hex_string()
        ));
        let data = self.http.get(&url, Timeout::Long).await?;
        pair_validate(&data)?;
        let plain_cert = Blob::from(xml::search(&data, "plaincert")?.as_str());
        let server_cert_pem = plain_cert.hex_to_bytes()?;

        info!("pairing stage #2: clientchallenge");
        let aes_key = if sha256_mode {
            crypto::aes_key_from_salted_pin_sha256(&salted_pin)
        } else {
            crypto::aes_key_from_salted_pin_sha1(&salted_pin)
        };
        let random_challenge = Blob::random(16);
        let encrypted_challenge = crypto::encrypt_aes_ecb(&random_challenge, &aes_key)?;

        let url = pair_url(&format!(
            "clientchallenge={}",
            encrypted_challenge.hex_string()
        ));
        let data = self.http.get(&url, Timeout::Long).await?;
        pair_validate(&data)?;
        let enc_server_challenge_resp =
            Blob::from(xml::search(&data, "challengeresponse")?.as_str()).hex_to_bytes()?;
        let dec_server_challenge_resp =
            crypto::decrypt_aes_ecb(&enc_server_challenge_resp, &aes_key)?;
        let server_response = dec_server_challenge_resp.subdata(0, hash_len);
        let server_challenge = dec_server_challenge_resp.subdata(hash_len, 16);

        info!("pairing stage #3: serverchallengeresp");
        let client_secret = Blob::random(16);
        let client_cert_signature = crypto::cert_signature(self.identity.cert_pem())?;
        let challenge_resp_hash = hash(
            &server_challenge
                .append(&client_cert_signature)
                .append(&client_secret),
        );
        let challenge_resp_encrypted = crypto::encrypt_aes_ecb(&challenge_resp_hash, &aes_key)?;

        let url = pair_url(&format!(
            "serverchallengeresp={}",
            challenge_resp_encrypted.hex_string()
        ));
        let data = self.http.get(&url, Timeout::Long).await?;
        pair_validate(&data)?;
        let server_secret_resp =
            Blob::from(xml::search(&data, "pairingsecret")?.as_str()).hex_to_bytes()?;
        let server_secret = server_secret_resp.subdata(0, 16);
        let server_signature = server_secret_resp.subdata(16, 256);

        // An attacker in the middle cannot produce this signature for the
        // certificate presented in stage 1.
        if !crypto::verify(&server_secret, &server_signature, &server_cert_pem)? {
            return Err(GsError::failed("MITM attack detected"));
        }

        // The server's proof over our stage-2 challenge. Reference servers
        // disagree on this value, so a mismatch is logged, not fatal.
        let expected_server_response = hash(
            &random_challenge
                .append(&crypto::cert_signature(&server_cert_pem)?)
                .append(&server_secret),
        );
        if server_response != expected_server_response {
            debug!("server challenge response hash mismatch (tolerated)");
        }

        info!("pairing stage #4: clientpairingsecret");
        let client_pairing_secret =
            client_secret.append(&crypto::sign(&client_secret, self.identity.key_pem())?);

        let url = pair_url(&format!(
            "clientpairingsecret={}",
            client_pairing_secret.hex_string()
        ));
        let data = self.http.get(&url, Timeout::Long).await?;
        pair_validate(&data)?;

        info!("pairing stage #5: pairchallenge");
        let url = format!(
            "https://{}:{}/pair?uniqueid={UNIQUE_ID}&devicename={DEVICE_NAME}&updateState=1&phrase=pairchallenge",
            server.address, server.https_port
        );
        let data = self.http.get(&url, Timeout::Long).await?;
        pair_validate(&data)?;

        Ok(())
    }

    /// Drop the pairing on the server side
    ///
    /// Best-effort: callers using this for cleanup must not treat failure
    /// as fatal.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request fails.
    pub async fn unpair(&self, server: &ServerData) -> Result<()> {
        let url = format!(
            "http://{}:{}/unpair?uniqueid={UNIQUE_ID}",
            server.address, server.http_port
        );
        self.http.get(&url, Timeout::Low).await.map(|_| ())
    }

    /// Fetch the list of streamable applications
    ///
    /// # Errors
    ///
    /// Transport, server-status or parse errors.
    pub async fn applist(&self, server: &ServerData) -> Result<Vec<AppEntry>> {
        let url = format!(
            "https://{}:{}/applist?uniqueid={UNIQUE_ID}",
            server.address, server.https_port
        );
        let data = self.http.get(&url, Timeout::Medium).await?;
        xml::status(&data)?;
        xml::applist(&data)
    }

    /// Fetch the box-art PNG for an application
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request fails.
    pub async fn app_boxart(&self, server: &ServerData, app_id: i32) -> Result<Blob> {
        let url = format!(
            "https://{}:{}/appasset?uniqueid={UNIQUE_ID}&appid={app_id}&AssetType=2&AssetIdx=0",
            server.address, server.https_port
        );
        Ok(Blob::from(self.http.get(&url, Timeout::Medium).await?))
    }

    /// Launch a new session or resume the running one
    ///
    /// Generates a fresh 16-byte remote-input AES key into `config`. With
    /// no game running this launches `app_id`; otherwise the existing
    /// session is resumed (the server allows only one). On a successful
    /// HTTP exchange `server.current_game` is set before the body is
    /// validated, so a later [`Self::quit_app`] knows a session may be
    /// active even if parsing failed.
    ///
    /// # Errors
    ///
    /// [`GsError::NotSupported4K`] for a 4K request against a non-4K
    /// server (checked before any traffic); [`GsError::Failed`] when the
    /// server reports `gamesession=0`; transport and parse errors.
    pub async fn start_app(
        &self,
        server: &mut ServerData,
        config: &mut StreamConfiguration,
        app_id: i32,
        sops: bool,
        local_audio: bool,
        gamepad_mask: i32,
    ) -> Result<()> {
        if config.height >= 2160 && !server.supports_4k() {
            return Err(GsError::NotSupported4K);
        }

        let rikey = Blob::random(16);
        config.remote_input_aes_key.copy_from_slice(rikey.as_slice());

        let url = if server.current_game == 0 {
            info!(app_id, "launching new session");
            let channel_count = config.audio.channel_count();
            let channel_mask = config.audio.channel_mask();
            // SOPS cannot optimize above 60 fps.
            let fps = if sops && config.fps > 60 { 60 } else { config.fps };
            format!(
                "https://{}:{}/launch?uniqueid={UNIQUE_ID}&appid={app_id}\
                 &mode={}x{}x{fps}&additionalStates=1&sops={}&rikey={}&rikeyid=0\
                 &localAudioPlayMode={}&surroundAudioInfo={}\
                 &remoteControllersBitmap={gamepad_mask}&gcmap={gamepad_mask}{}",
                server.address,
                server.https_port,
                config.width,
                config.height,
                i32::from(sops),
                rikey.hex_string(),
                i32::from(local_audio),
                (channel_mask << 16) + channel_count,
                self.launch_url_extra
            )
        } else {
            info!(app_id, "resuming existing session");
            format!(
                "https://{}:{}/resume?uniqueid={UNIQUE_ID}&rikey={}&rikeyid=0{}",
                server.address,
                server.https_port,
                rikey.hex_string(),
                self.launch_url_extra
            )
        };

        let data = self.http.get(&url, Timeout::Long).await?;
        server.current_game = app_id;

        xml::status(&data)?;
        let game_session = xml::search(&data, "gamesession")?;
        if game_session == "0" {
            return Err(GsError::failed("Failed to start the app"));
        }

        match xml::search(&data, "sessionUrl0") {
            Ok(session_url) => server.rtsp_session_url = Some(session_url),
            Err(_) => warn!("sessionUrl0 not found in launch response"),
        }

        Ok(())
    }

    /// Cancel the running session
    ///
    /// # Errors
    ///
    /// [`GsError::Failed`] when the server reports `cancel=0`; transport
    /// and parse errors.
    pub async fn quit_app(&self, server: &mut ServerData) -> Result<()> {
        let url = format!(
            "https://{}:{}/cancel?uniqueid={UNIQUE_ID}",
            server.address, server.https_port
        );
        let data = self.http.get(&url, Timeout::Medium).await?;

        xml::status(&data)?;
        let cancel = xml::search(&data, "cancel")?;
        if cancel == "0" {
            return Err(GsError::failed("Failed to quit the app"));
        }

        server.current_game = 0;
        Ok(())
    }
}

/// Validate a pairing stage response: HTTP-level status must be 200 and a
/// `paired` element must be present
fn pair_validate(data: &[u8]) -> Result<String> {
    xml::status(data)?;
    xml::search(data, "paired")
}

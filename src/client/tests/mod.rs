//! Orchestrator tests driven through the mock transport

use std::sync::OnceLock;

use crate::blob::Blob;
use crate::crypto::ClientIdentity;
use crate::error::{GsError, Result};
use crate::server::ServerData;
use crate::testing::{MockRequestClient, xml_response};

use super::GameStreamClient;

mod session;

/// Generating RSA-2048 identities is slow; share one across tests.
fn test_identity() -> ClientIdentity {
    static IDENTITY: OnceLock<ClientIdentity> = OnceLock::new();
    IDENTITY
        .get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            ClientIdentity::generate(dir.path()).unwrap()
        })
        .clone()
}

/// A second, independent identity standing in for the server
fn server_identity() -> ClientIdentity {
    static IDENTITY: OnceLock<ClientIdentity> = OnceLock::new();
    IDENTITY
        .get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            ClientIdentity::generate(dir.path()).unwrap()
        })
        .clone()
}

fn client_with(
    handler: impl Fn(&str) -> Result<Vec<u8>> + Send + Sync + 'static,
) -> GameStreamClient<MockRequestClient> {
    GameStreamClient::with_transport(MockRequestClient::new(handler), test_identity())
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

fn serverinfo_body(paired: bool, current_game: i32, app_version: &str, state: &str) -> Vec<u8> {
    xml_response(
        200,
        &format!(
            "<hostname>DESKTOP</hostname>\
             <appversion>{app_version}</appversion>\
             <GfeVersion>3.23.0.74</GfeVersion>\
             <GsVersion>7.1</GsVersion>\
             <mac>aa:bb:cc:dd:ee:ff</mac>\
             <gputype>NVIDIA GeForce RTX 3080</gputype>\
             <ServerCodecModeSupport>259</ServerCodecModeSupport>\
             <HttpsPort>47984</HttpsPort>\
             <currentgame>{current_game}</currentgame>\
             <PairStatus>{}</PairStatus>\
             <state>{state}</state>",
            i32::from(paired)
        ),
    )
}

fn paired_server() -> ServerData {
    let mut server = ServerData::new("10.0.0.2", 47989);
    server.https_port = 47984;
    server.paired = true;
    server.app_version = "7.1.431.0".into();
    server.server_major_version = 7;
    server.server_codec_mode_support = 259;
    server
}

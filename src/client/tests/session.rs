use super::*;
use crate::error::GsStatus;
use crate::server::{AudioConfiguration, StreamConfiguration};

fn launch_response(game_session: &str, session_url: Option<&str>) -> Vec<u8> {
    let session = session_url
        .map(|url| format!("<sessionUrl0>{url}</sessionUrl0>"))
        .unwrap_or_default();
    xml_response(
        200,
        &format!("<gamesession>{game_session}</gamesession>{session}"),
    )
}

#[tokio::test]
async fn test_launch_url_when_idle() {
    let client = client_with(|_| {
        Ok(launch_response(
            "1",
            Some("rtsp://10.0.0.2:48010"),
        ))
    });

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 667, true, false, 0x1)
        .await
        .unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests.len(), 1);
    let url = &requests[0];
    assert!(url.starts_with("https://10.0.0.2:47984/launch?"));
    assert_eq!(query_param(url, "appid").as_deref(), Some("667"));
    assert_eq!(query_param(url, "mode").as_deref(), Some("1920x1080x60"));
    assert_eq!(query_param(url, "additionalStates").as_deref(), Some("1"));
    assert_eq!(query_param(url, "sops").as_deref(), Some("1"));
    assert_eq!(query_param(url, "rikeyid").as_deref(), Some("0"));
    assert_eq!(query_param(url, "localAudioPlayMode").as_deref(), Some("0"));
    assert_eq!(
        query_param(url, "remoteControllersBitmap").as_deref(),
        Some("1")
    );
    assert_eq!(query_param(url, "gcmap").as_deref(), Some("1"));

    assert_eq!(server.current_game, 667);
    assert_eq!(
        server.rtsp_session_url.as_deref(),
        Some("rtsp://10.0.0.2:48010")
    );
}

#[tokio::test]
async fn test_resume_url_when_in_game() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    server.current_game = 667;
    let mut config = StreamConfiguration::new(1280, 720, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 667, true, false, 0x1)
        .await
        .unwrap();

    let url = &client.transport().requests()[0];
    assert!(url.starts_with("https://10.0.0.2:47984/resume?"));
    assert!(query_param(url, "rikey").is_some());
    assert_eq!(query_param(url, "rikeyid").as_deref(), Some("0"));
    assert!(query_param(url, "appid").is_none());
    assert!(query_param(url, "mode").is_none());
    assert!(server.rtsp_session_url.is_none());
}

#[tokio::test]
async fn test_launch_generates_remote_input_key() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap();

    let url = &client.transport().requests()[0];
    let rikey = query_param(url, "rikey").unwrap();
    assert_eq!(rikey.len(), 32);
    assert_eq!(rikey, Blob::from(&config.remote_input_aes_key[..]).hex_string());
    assert_ne!(config.remote_input_aes_key, [0u8; 16]);
}

#[tokio::test]
async fn test_sops_clamps_fps_to_60() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 120, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap();

    let url = &client.transport().requests()[0];
    assert_eq!(query_param(url, "mode").as_deref(), Some("1920x1080x60"));
}

#[tokio::test]
async fn test_fps_unclamped_without_sops() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 120, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 1, false, false, 0)
        .await
        .unwrap();

    let url = &client.transport().requests()[0];
    assert_eq!(query_param(url, "mode").as_deref(), Some("1920x1080x120"));
    assert_eq!(query_param(url, "sops").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_surround_audio_info_encoding() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Surround51);
    client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap();

    // (0xFC << 16) + 6
    let url = &client.transport().requests()[0];
    assert_eq!(
        query_param(url, "surroundAudioInfo").as_deref(),
        Some("16515078")
    );
}

#[tokio::test]
async fn test_stereo_audio_info_encoding() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap();

    // (0x3 << 16) + 2
    let url = &client.transport().requests()[0];
    assert_eq!(
        query_param(url, "surroundAudioInfo").as_deref(),
        Some("196610")
    );
}

#[tokio::test]
async fn test_4k_rejected_before_any_traffic() {
    let client = client_with(|_| panic!("no traffic expected"));

    let mut server = paired_server();
    server.server_codec_mode_support = 0;
    let mut config = StreamConfiguration::new(3840, 2160, 60, AudioConfiguration::Stereo);
    let err = client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap_err();

    assert_eq!(err.status(), GsStatus::NotSupported4K);
    assert_eq!(client.transport().request_count(), 0);
    assert_eq!(server.current_game, 0);
}

#[tokio::test]
async fn test_launch_url_extra_appended() {
    let client = {
        let mut client = client_with(|_| Ok(launch_response("1", None)));
        client.set_launch_url_extra("&corever=1&appversion=7.1.431.0");
        client
    };

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 1, true, false, 0)
        .await
        .unwrap();

    let url = &client.transport().requests()[0];
    assert!(url.ends_with("&corever=1&appversion=7.1.431.0"));
}

#[tokio::test]
async fn test_gamesession_zero_is_failure_but_marks_session() {
    let client = client_with(|_| Ok(launch_response("0", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    let err = client
        .start_app(&mut server, &mut config, 667, true, false, 0)
        .await
        .unwrap_err();

    assert_eq!(err.status(), GsStatus::Failed);
    // The HTTP exchange succeeded, so a session may exist server-side.
    assert_eq!(server.current_game, 667);
}

#[tokio::test]
async fn test_launch_tolerates_missing_session_url() {
    let client = client_with(|_| Ok(launch_response("1", None)));

    let mut server = paired_server();
    let mut config = StreamConfiguration::new(1920, 1080, 60, AudioConfiguration::Stereo);
    client
        .start_app(&mut server, &mut config, 667, true, false, 0)
        .await
        .unwrap();
    assert!(server.rtsp_session_url.is_none());
}

#[tokio::test]
async fn test_quit_app_resets_current_game() {
    let client = client_with(|_| Ok(xml_response(200, "<cancel>1</cancel>")));

    let mut server = paired_server();
    server.current_game = 667;
    client.quit_app(&mut server).await.unwrap();

    assert_eq!(server.current_game, 0);
    let url = &client.transport().requests()[0];
    assert_eq!(
        url,
        "https://10.0.0.2:47984/cancel?uniqueid=0123456789ABCDEF"
    );
}

#[tokio::test]
async fn test_quit_app_cancel_zero_is_failure() {
    let client = client_with(|_| Ok(xml_response(200, "<cancel>0</cancel>")));

    let mut server = paired_server();
    server.current_game = 667;
    let err = client.quit_app(&mut server).await.unwrap_err();

    assert_eq!(err.status(), GsStatus::Failed);
    assert_eq!(server.current_game, 667);
}

#[tokio::test]
async fn test_applist_parses_entries() {
    let client = client_with(|_| {
        Ok(xml_response(
            200,
            "<App><ID>1</ID><AppTitle>Desktop</AppTitle>\
             <IsHdrSupported>0</IsHdrSupported></App>\
             <App><ID>667</ID><AppTitle>Steam</AppTitle>\
             <IsHdrSupported>1</IsHdrSupported></App>",
        ))
    });

    let server = paired_server();
    let apps = client.applist(&server).await.unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].id, 1);
    assert_eq!(apps[0].title, "Desktop");
    assert!(!apps[0].hdr_supported);
    assert_eq!(apps[1].id, 667);
    assert!(apps[1].hdr_supported);

    let url = &client.transport().requests()[0];
    assert!(url.starts_with("https://10.0.0.2:47984/applist?"));
}

#[tokio::test]
async fn test_app_boxart_returns_raw_bytes() {
    // Box art is a PNG, not XML.
    let png = b"\x89PNG\r\n\x1a\n....".to_vec();
    let response = png.clone();
    let client = client_with(move |_| Ok(response.clone()));

    let server = paired_server();
    let art = client.app_boxart(&server, 667).await.unwrap();
    assert_eq!(art.as_slice(), png.as_slice());

    let url = &client.transport().requests()[0];
    assert_eq!(query_param(url, "appid").as_deref(), Some("667"));
    assert_eq!(query_param(url, "AssetType").as_deref(), Some("2"));
    assert_eq!(query_param(url, "AssetIdx").as_deref(), Some("0"));
}

use fulmen::error::FulmenError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        FulmenError::config("x"),
        FulmenError::Config { .. }
    ));
    assert!(matches!(FulmenError::auth("x"), FulmenError::Auth { .. }));
    assert!(matches!(
        FulmenError::http_client(404, "x"),
        FulmenError::HttpClient { status: 404, .. }
    ));
    assert!(matches!(
        FulmenError::http_server(500, "x"),
        FulmenError::HttpServer { status: 500, .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        FulmenError::timeout("x"),
        FulmenError::Timeout { .. }
    ));
    assert!(matches!(FulmenError::parse("x"), FulmenError::Parse { .. }));
    assert!(matches!(FulmenError::value("x"), FulmenError::Value { .. }));
    assert!(matches!(
        FulmenError::network("x"),
        FulmenError::Network { .. }
    ));
    assert!(matches!(FulmenError::io("x"), FulmenError::Io { .. }));
    assert!(matches!(
        FulmenError::generic("x"),
        FulmenError::Generic { .. }
    ));
}

#[test]
fn client_error_classification() {
    assert!(FulmenError::http_client(400, "x").is_client_error());
    assert!(!FulmenError::http_server(502, "x").is_client_error());
    assert!(!FulmenError::timeout("x").is_client_error());
}

#[test]
fn display_messages() {
    let e = FulmenError::value("Invalid response data");
    let s = format!("{}", e);
    assert!(s.contains("Value error"));

    let e = FulmenError::http_client(401, "401 https://api.clp.com.hk/x : denied");
    assert!(format!("{}", e).starts_with("HTTP client error 401"));
}

use crate::{standard_reply, ScriptedServer, TestEnvironment};

use gftp::{AuthError, AuthPhase, StaticCredentials};

#[test]
fn test_simple_login() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.session(&server);
    session
        .authorize(&mut StaticCredentials::new("test", "test"))
        .unwrap();
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_login_without_password() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220 Ready", |line| match line {
        "USER anonymous" => vec!["230 Guest login ok".to_owned()],
        _ => standard_reply(line),
    });
    let mut session = env.session(&server);
    session
        .authorize(&mut StaticCredentials::new("anonymous", "unused"))
        .unwrap();
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER anonymous", "QUIT"]);
}

#[test]
fn test_multiline_greeting() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220-Welcome\r\n220-Be nice\r\n220 Ready", standard_reply);
    let mut session = env.session(&server);
    session
        .authorize(&mut StaticCredentials::new("test", "test"))
        .unwrap();
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_rejected_username_exhausts_attempts() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220 Ready", |line| {
        if line.starts_with("USER") {
            vec!["530 Not logged in".to_owned()]
        } else {
            standard_reply(line)
        }
    });
    let mut session = env.session(&server);
    let err = session
        .authorize(&mut StaticCredentials::new("nobody", "test"))
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::MaxAttemptsReached {
            phase: AuthPhase::Username,
            attempts: 3
        }
    ));
    drop(session);
    assert_eq!(server.join(), vec!["USER nobody"; 3]);
}

#[test]
fn test_wrong_password_gets_its_own_budget() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220 Ready", |line| {
        if line.starts_with("PASS") {
            vec!["530 Login incorrect".to_owned()]
        } else {
            standard_reply(line)
        }
    });
    let mut config = env.config();
    config.auth_attempts = 2;
    let mut session = env.session_with(&server, &config);
    let err = session
        .authorize(&mut StaticCredentials::new("test", "wrong"))
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::MaxAttemptsReached {
            phase: AuthPhase::Password,
            attempts: 2
        }
    ));
    drop(session);
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS wrong", "USER test", "PASS wrong"]
    );
}

#[test]
fn test_service_unavailable() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("421 Too many users", standard_reply);
    let mut session = env.session(&server);
    let err = session
        .authorize(&mut StaticCredentials::new("test", "test"))
        .unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    drop(session);
    assert!(server.join().is_empty());
}

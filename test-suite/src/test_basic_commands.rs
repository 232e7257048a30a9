use crate::{standard_reply, ScriptedServer, TestEnvironment};

use gftp::{error_code, CommandError, DataType, Flow, TransferMode};

#[test]
fn test_connect_and_quit() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("quit").unwrap(), Flow::Terminate);
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_quit_ignores_trailing_words() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("quit now").unwrap(), Flow::Terminate);
    assert_eq!(session.execute("q right away").unwrap(), Flow::Terminate);
    let err = session.execute("pwd now").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::TooManyParams(0))
    );
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_simple_commands_print_replies() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("SYS").unwrap(), Flow::Continue);
    assert_eq!(session.execute("pwd").unwrap(), Flow::Continue);
    assert_eq!(session.execute("cd /pub").unwrap(), Flow::Continue);
    session.close().unwrap();
    let output = env.output.contents();
    assert!(output.contains("215 UNIX Type: L8\r\n"));
    assert!(output.contains("257 \"/\" is the current directory"));
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "SYST", "PWD", "CWD /pub", "QUIT"]
    );
}

#[test]
fn test_invalid_command_keeps_session() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    let err = session.execute("xyz").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::Invalid("xyz".to_owned()))
    );
    assert_eq!(Flow::after_error(&err), Flow::Continue);
    assert!(error_code(&err) > 0);

    let err = session.execute("cd").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::MissingParam("cd"))
    );
    assert_eq!(session.execute("pwd").unwrap(), Flow::Continue);
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "PWD", "QUIT"]);
}

#[test]
fn test_raw_passthrough() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220 Ready", |line| match line {
        "SITE CHMOD 644 notes.txt" => vec!["200 SITE command successful".to_owned()],
        _ => standard_reply(line),
    });
    let mut session = env.logged_in(&server);
    assert_eq!(
        session.execute("#SITE CHMOD 644 notes.txt").unwrap(),
        Flow::Continue
    );
    session.close().unwrap();
    assert!(env.output.contents().contains("200 SITE command successful"));
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "SITE CHMOD 644 notes.txt", "QUIT"]
    );
}

#[test]
fn test_local_help_sends_nothing() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("help").unwrap(), Flow::Continue);
    assert_eq!(session.execute("passive").unwrap(), Flow::Continue);
    let err = session.execute("passive off").unwrap_err();
    assert_eq!(
        err.downcast_ref::<CommandError>(),
        Some(&CommandError::Unsupported("active mode"))
    );
    session.close().unwrap();
    let output = env.output.contents();
    assert!(output.contains("get <file>"));
    assert!(output.contains("Passive mode: on"));
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_settings_change_defaults() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    session.execute("type I").unwrap();
    session.execute("mode b").unwrap();
    assert_eq!(session.defaults().data_type, Some(DataType::Image));
    assert_eq!(session.defaults().transfer_mode, Some(TransferMode::Block));
    session.execute("mode reset").unwrap();
    assert_eq!(session.defaults().transfer_mode, None);
    assert!(session.execute("stru X").is_err());
    session.close().unwrap();
    assert!(env.output.contents().contains("type=I mode=default stru=default"));
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_silent_server_is_reported() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::start("220 Ready", |_| Vec::new());
    let mut session = env.session(&server);
    assert_eq!(session.execute("#NOOP").unwrap(), Flow::Continue);
    drop(session);
    assert!(env.output.contents().contains("No reply from the server"));
    assert_eq!(server.join(), vec!["NOOP"]);
}

#[test]
fn test_lost_connection_terminates() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::hang_up("220 Ready");
    let mut session = env.session(&server);
    assert!(server.join().is_empty());
    let err = session.execute("pwd").unwrap_err();
    assert_eq!(Flow::after_error(&err), Flow::Terminate);
    assert!(error_code(&err) < 0);
}

use std::net::TcpListener;

use crate::{pasv_reply_for, standard_reply, DataEndpoint, ScriptedServer, TestEnvironment, PAUSE};

use gftp::{
    error_code, Flow, ListingOutput, ParseHostPortError, ResourceError, Session, TransferError,
    TransferReport, TransferState, FTP_MAX_DATA_THREADS,
};

fn transfer_server(pasv_reply: String) -> ScriptedServer {
    ScriptedServer::start("220 Ready", move |line| {
        let verb = line.split_whitespace().next().unwrap_or_default();
        match verb {
            "PASV" => vec![pasv_reply.clone()],
            "RETR" if line == "RETR missing.txt" => vec!["550 No such file".to_owned()],
            "RETR" | "LIST" | "STOR" => vec![
                "150 Opening data connection".to_owned(),
                "226 Transfer complete".to_owned(),
            ],
            _ => standard_reply(line),
        }
    })
}

fn finished_reports(session: &Session) -> Vec<TransferReport> {
    loop {
        let reports = session.transfers();
        if reports.iter().all(|report| !report.running) {
            return reports;
        }
        gftp::thread::sleep(5);
    }
}

#[test]
fn test_multi_packet_download() {
    let env = TestEnvironment::new();
    let payload: Vec<u8> = (0..20_000u32).map(|n| (n % 253) as u8).collect();
    let data = DataEndpoint::serve(payload.clone(), 1);
    let server = transfer_server(data.pasv_reply());
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("get pub/notes.txt").unwrap(), Flow::Continue);
    session.close().unwrap();
    data.join();
    assert_eq!(env.read("notes.txt"), payload);
    assert!(env.output.contents().contains("Transfer RETR pub/notes.txt started"));
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "PASV", "RETR pub/notes.txt", "QUIT"]
    );
}

#[test]
fn test_empty_download() {
    let env = TestEnvironment::new();
    let data = DataEndpoint::serve(Vec::new(), 1);
    let server = transfer_server(data.pasv_reply());
    let mut session = env.logged_in(&server);
    session.execute("get empty.bin").unwrap();
    session.close().unwrap();
    data.join();
    assert!(env.exists("empty.bin"));
    assert!(env.read("empty.bin").is_empty());
    server.join();
}

#[test]
fn test_transfer_parameters_are_negotiated() {
    let env = TestEnvironment::new();
    let data = DataEndpoint::serve(b"total 0\r\n".to_vec(), 1);
    let server = transfer_server(data.pasv_reply());
    let mut config = env.config();
    config.listing_output = ListingOutput::File(env.path("listing.txt"));
    let mut session = env.session_with(&server, &config);
    session
        .authorize(&mut gftp::StaticCredentials::new("test", "test"))
        .unwrap();
    session.execute("stru f").unwrap();
    session.execute("mode s").unwrap();
    session.execute("type I").unwrap();
    session.execute("dir").unwrap();
    session.close().unwrap();
    data.join();
    assert_eq!(env.read("listing.txt"), b"total 0\r\n");
    assert_eq!(
        server.join(),
        vec![
            "USER test", "PASS test", "TYPE I", "MODE S", "STRU F", "PASV", "LIST", "QUIT"
        ]
    );
}

#[test]
fn test_progress_is_reported() {
    let env = TestEnvironment::new();
    let data = DataEndpoint::serve(vec![7; 4096], 1);
    let server = transfer_server(data.pasv_reply());
    let mut session = env.logged_in(&server);
    session.execute("get seven.bin").unwrap();
    data.join();
    let reports = finished_reports(&session);
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.label, "RETR seven.bin");
    assert_eq!(report.progress.state, TransferState::Closed);
    assert_eq!(report.progress.bytes, 4096);
    assert_eq!(report.progress.error, None);
    session.close().unwrap();
    server.join();
}

#[test]
fn test_missing_file_name() {
    let env = TestEnvironment::new();
    let server = ScriptedServer::standard();
    let mut session = env.logged_in(&server);
    let err = session.execute("get").unwrap_err();
    assert_eq!(Flow::after_error(&err), Flow::Continue);
    assert_eq!(error_code(&err), 1);
    session.close().unwrap();
    assert_eq!(server.join(), vec!["USER test", "PASS test", "QUIT"]);
}

#[test]
fn test_refused_retrieve_opens_nothing() {
    let env = TestEnvironment::new();
    let data = DataEndpoint::serve(Vec::new(), 0);
    let server = transfer_server(data.pasv_reply());
    let mut session = env.logged_in(&server);
    let err = session.execute("get missing.txt").unwrap_err();
    match err.downcast_ref::<TransferError>() {
        Some(TransferError::Refused { reply, .. }) => assert_eq!(reply.code, 550),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(session.transfers().is_empty());
    assert!(!env.exists("missing.txt"));
    session.close().unwrap();
    data.join();
    server.join();
}

#[test]
fn test_malformed_pasv_keeps_session() {
    let env = TestEnvironment::new();
    let server = transfer_server("227 Entering Passive Mode (1,2,3)".to_owned());
    let mut session = env.logged_in(&server);
    let err = session.execute("get notes.txt").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TransferError>(),
        Some(TransferError::MalformedPasv(ParseHostPortError::SpanLength(6)))
    ));
    assert_eq!(Flow::after_error(&err), Flow::Continue);
    assert_eq!(session.execute("pwd").unwrap(), Flow::Continue);
    session.close().unwrap();
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "PASV", "PWD", "QUIT"]
    );
}

#[test]
fn test_pool_exhaustion() {
    let env = TestEnvironment::new();
    let mut data = DataEndpoint::hold(FTP_MAX_DATA_THREADS);
    let server = transfer_server(data.pasv_reply());
    let mut session = env.logged_in(&server);
    for n in 0..FTP_MAX_DATA_THREADS {
        session.execute(&format!("get file{}.bin", n)).unwrap();
    }
    assert_eq!(session.transfers().len(), FTP_MAX_DATA_THREADS);

    let err = session.execute("get one-too-many.bin").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ResourceError>(),
        Some(ResourceError::PoolExhausted(FTP_MAX_DATA_THREADS))
    ));
    assert_eq!(Flow::after_error(&err), Flow::Continue);
    assert!(!env.exists("one-too-many.bin"));

    data.release();
    session.close().unwrap();
    data.join();
    for n in 0..FTP_MAX_DATA_THREADS {
        assert!(env.exists(&format!("file{}.bin", n)));
    }
    server.join();
}

#[test]
fn test_late_completion_does_not_answer_next_request() {
    let env = TestEnvironment::new();
    let payload = b"two files, one payload\n".to_vec();
    let data = DataEndpoint::serve(payload.clone(), 2);
    let pasv = data.pasv_reply();
    let mut retrieved = 0;
    // RETR only gets 150. Its 226 comes right before the next reply, in its
    // own packet.
    let server = ScriptedServer::start("220 Ready", move |line| {
        let verb = line.split_whitespace().next().unwrap_or_default();
        let completion = vec!["226 Transfer complete".to_owned(), PAUSE.to_owned()];
        match verb {
            "RETR" => {
                retrieved += 1;
                vec!["150 Opening data connection".to_owned()]
            }
            "PASV" if retrieved == 0 => vec![pasv.clone()],
            "PASV" => [completion, vec![pasv.clone()]].concat(),
            "QUIT" => [completion, standard_reply(line)].concat(),
            _ => standard_reply(line),
        }
    });
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("get a.txt").unwrap(), Flow::Continue);
    assert_eq!(session.execute("get b.txt").unwrap(), Flow::Continue);
    session.close().unwrap();
    data.join();
    assert_eq!(env.read("a.txt"), payload);
    assert_eq!(env.read("b.txt"), payload);
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "PASV", "RETR a.txt", "PASV", "RETR b.txt", "QUIT"]
    );
}

#[test]
fn test_unreachable_data_endpoint_keeps_session() {
    let env = TestEnvironment::new();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let pasv = pasv_reply_for(listener.local_addr().unwrap());
    drop(listener);
    let server = transfer_server(pasv);
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("get notes.txt").unwrap(), Flow::Continue);
    let reports = finished_reports(&session);
    assert_eq!(reports.len(), 1);
    let progress = &reports[0].progress;
    assert_eq!(progress.state, TransferState::Closed);
    assert_eq!(progress.bytes, 0);
    let error = progress.error.as_deref().unwrap();
    assert!(error.starts_with("could not connect to data endpoint"), "{}", error);
    assert_eq!(session.execute("pwd").unwrap(), Flow::Continue);
    session.close().unwrap();
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "PASV", "RETR notes.txt", "PWD", "QUIT"]
    );
}

#[test]
fn test_send_records_unsupported_upload() {
    let env = TestEnvironment::new();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server = transfer_server(pasv_reply_for(listener.local_addr().unwrap()));
    let mut session = env.logged_in(&server);
    assert_eq!(session.execute("send local.txt").unwrap(), Flow::Continue);
    let reports = finished_reports(&session);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].label, "STOR local.txt");
    assert_eq!(reports[0].progress.state, TransferState::Closed);
    assert_eq!(
        reports[0].progress.error,
        Some(TransferError::UploadUnsupported.to_string())
    );
    // The remote file is never opened for writing.
    listener.set_nonblocking(true).unwrap();
    assert!(listener.accept().is_err());
    session.close().unwrap();
    assert_eq!(
        server.join(),
        vec!["USER test", "PASS test", "PASV", "STOR local.txt", "QUIT"]
    );
}

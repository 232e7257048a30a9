use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, Once};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gftp::{ClientConfig, ControlChannel, Session, StaticCredentials};

use simplelog::*;
use tempdir::TempDir;

#[cfg(test)]
mod test_authorization;
#[cfg(test)]
mod test_basic_commands;
#[cfg(test)]
mod test_data_transfer;

static INIT_LOG: Once = Once::new();

fn initialize_logger() {
    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Warn,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(
            LevelFilter::Debug,
            Config::default(),
            File::create("test.log").unwrap(),
        ),
    ])
    .unwrap();
}

pub const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// A reply entry that flushes what came before it and waits 50 ms, so the
/// client sees the rest in a later packet.
pub const PAUSE: &str = "<pause>";

pub fn pasv_reply_for(addr: SocketAddr) -> String {
    let port = addr.port();
    format!(
        "227 Entering Passive Mode (127,0,0,1,{},{}).",
        port >> 8,
        port & 0xff
    )
}

/// Canned answers for the verbs every scripted session needs.
pub fn standard_reply(line: &str) -> Vec<String> {
    let verb = line.split_whitespace().next().unwrap_or_default();
    let reply = match verb.to_uppercase().as_str() {
        "USER" => "331 Password required",
        "PASS" => "230 User logged in",
        "SYST" => "215 UNIX Type: L8",
        "PWD" => "257 \"/\" is the current directory",
        "CWD" | "CDUP" => "250 Directory changed",
        "TYPE" | "MODE" | "STRU" | "NOOP" => "200 Command okay",
        "QUIT" => "221 Goodbye",
        _ => "502 Command not implemented",
    };
    vec![reply.to_owned()]
}

/// A one-connection FTP server answering every request line through a
/// closure. Joining it returns the request lines it received.
pub struct ScriptedServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl ScriptedServer {
    pub fn start<F>(greeting: &str, mut responder: F) -> ScriptedServer
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        INIT_LOG.call_once(initialize_logger);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let greeting = format!("{}\r\n", greeting);
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            writer.write_all(greeting.as_bytes()).unwrap();
            let mut reader = BufReader::new(stream);
            let mut received = Vec::new();
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let line = line.trim_end().to_owned();
                let mut packets = vec![String::new()];
                for reply in responder(&line) {
                    if reply == PAUSE {
                        packets.push(String::new());
                        continue;
                    }
                    if let Some(packet) = packets.last_mut() {
                        packet.push_str(&reply);
                        packet.push_str("\r\n");
                    }
                }
                received.push(line);
                let mut sent = true;
                for (n, packet) in packets.iter().enumerate() {
                    if n > 0 {
                        thread::sleep(Duration::from_millis(50));
                    }
                    sent = writer.write_all(packet.as_bytes()).is_ok() && writer.flush().is_ok();
                    if !sent {
                        break;
                    }
                }
                if !sent {
                    break;
                }
            }
            received
        });
        ScriptedServer { addr, handle }
    }

    /// Sends the greeting and closes the connection.
    pub fn hang_up(greeting: &str) -> ScriptedServer {
        INIT_LOG.call_once(initialize_logger);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let greeting = format!("{}\r\n", greeting);
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(greeting.as_bytes()).unwrap();
            Vec::new()
        });
        ScriptedServer { addr, handle }
    }

    /// A server that logs `USER test`/`PASS test` in and answers the rest
    /// with `standard_reply`.
    pub fn standard() -> ScriptedServer {
        ScriptedServer::start("220 Service ready", standard_reply)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn join(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

/// Passive data listener. Serves `payload` to each accepted connection, in
/// chunks, then closes it.
pub struct DataEndpoint {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    release: Option<Sender<()>>,
}

impl DataEndpoint {
    pub fn serve(payload: Vec<u8>, connections: usize) -> DataEndpoint {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            for _ in 0..connections {
                let (mut stream, _) = listener.accept().unwrap();
                for chunk in payload.chunks(1000) {
                    stream.write_all(chunk).unwrap();
                    stream.flush().unwrap();
                    thread::sleep(Duration::from_millis(1));
                }
            }
        });
        DataEndpoint {
            addr,
            handle,
            release: None,
        }
    }

    /// Accepts `connections` data connections and keeps them open, sending
    /// nothing, until `release` is called.
    pub fn hold(connections: usize) -> DataEndpoint {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (release, released) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let held: Vec<TcpStream> = (0..connections)
                .map(|_| listener.accept().unwrap().0)
                .collect();
            let _ = released.recv();
            drop(held);
        });
        DataEndpoint {
            addr,
            handle,
            release: Some(release),
        }
    }

    pub fn pasv_reply(&self) -> String {
        pasv_reply_for(self.addr)
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release.send(()).unwrap();
        }
    }

    pub fn join(mut self) {
        self.release();
        self.handle.join().unwrap();
    }
}

/// Clonable `Write` target that lets tests read what the session printed.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct TestEnvironment {
    pub dir: TempDir,
    pub output: SharedBuffer,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new() -> TestEnvironment {
        INIT_LOG.call_once(initialize_logger);
        TestEnvironment {
            dir: TempDir::new("gftp-test").unwrap(),
            output: SharedBuffer::default(),
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            poll_timeout: POLL_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            download_dir: self.dir.path().to_path_buf(),
            ..ClientConfig::default()
        }
    }

    pub fn session_with(&self, server: &ScriptedServer, config: &ClientConfig) -> Session {
        let control =
            ControlChannel::connect(server.addr(), config.connect_timeout, config.poll_timeout)
                .unwrap();
        Session::new(control, config).with_output(self.output.clone())
    }

    pub fn session(&self, server: &ScriptedServer) -> Session {
        self.session_with(server, &self.config())
    }

    /// Connects and logs in as `test`/`test`.
    pub fn logged_in(&self, server: &ScriptedServer) -> Session {
        let mut session = self.session(server);
        session
            .authorize(&mut StaticCredentials::new("test", "test"))
            .unwrap();
        session
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path(name)).unwrap()
    }

    pub fn exists(&self, name: &str) -> bool {
        Path::new(&self.path(name)).exists()
    }
}

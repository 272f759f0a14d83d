//! The inspection channel: a tiny request/response server speaking the
//! JSON-shaped debugger protocol over TCP. Runs on its own OS thread; all
//! scheduler coordination goes through the shared `DebugControl`.

use crate::debugger::{DebugControl, MachineSnapshot};
use log::{debug, error, info};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// A running inspection server. Dropping the handle does not stop the
/// server; it lives for the process.
pub struct DebugServer {
    pub port: u16,
    _handle: thread::JoinHandle<()>,
}

/// Bind the protocol port and serve requests on a dedicated thread.
/// Binding port 0 picks a free port; the bound port is reported back.
pub fn spawn(control: Arc<DebugControl>, port: u16) -> io::Result<DebugServer> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    let port = listener.local_addr()?.port();
    info!("script debugger listening on 127.0.0.1:{port}");
    let handle = thread::spawn(move || serve(listener, control));
    Ok(DebugServer {
        port,
        _handle: handle,
    })
}

fn serve(listener: TcpListener, control: Arc<DebugControl>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_client(stream, &control) {
                    debug!("debugger client error: {e}");
                }
            }
            Err(e) => error!("debugger accept failed: {e}"),
        }
    }
}

fn handle_client(stream: TcpStream, control: &Arc<DebugControl>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    // Drain headers; the protocol is GET-only and bodiless.
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("");
    debug!("debugger request: {path}");
    match path {
        "/" => respond(stream, "200 OK", "text/html", CONSOLE_PAGE),
        "/state" => respond_state(stream, control.state()),
        "/interrupt" => respond_state(stream, control.interrupt()),
        "/step" => respond_state(stream, control.step()),
        "/continue" => respond_state(stream, control.resume()),
        _ => respond(stream, "404 Not Found", "text/plain", "not found\n"),
    }
}

fn respond_state(stream: TcpStream, snapshot: MachineSnapshot) -> io::Result<()> {
    match serde_json::to_string(&snapshot) {
        Ok(body) => respond(stream, "200 OK", "application/json", &body),
        Err(e) => {
            error!("snapshot serialization failed: {e}");
            respond(
                stream,
                "500 Internal Server Error",
                "text/plain",
                "serialization failure\n",
            )
        }
    }
}

fn respond(mut stream: TcpStream, status: &str, content_type: &str, body: &str) -> io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}

const CONSOLE_PAGE: &str = r#"<!doctype html>
<html>
<head><title>script debugger</title></head>
<body>
<h1>script debugger</h1>
<p>
<button onclick="act('interrupt')">interrupt</button>
<button onclick="act('step')">step</button>
<button onclick="act('continue')">continue</button>
<button onclick="act('state')">refresh</button>
</p>
<pre id="state"></pre>
<script>
function act(cmd) {
  fetch('/' + cmd)
    .then(r => r.json())
    .then(s => document.getElementById('state').textContent =
        JSON.stringify(s, null, 2));
}
act('state');
</script>
</body>
</html>
"#;

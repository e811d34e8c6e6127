//! A level-triggered TCP echo server on a single reactor thread.
//!
//! Run with `cargo run --example echo_server`, then connect with
//! `nc 127.0.0.1 8080`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

use weir_io::{Event, EventHandler, EventLoop, Interest, PollHandle, Result};

type Connections = Rc<RefCell<HashMap<RawFd, TcpStream>>>;

struct ListenerHandler {
    listener: TcpListener,
    connections: Connections,
}

impl EventHandler for ListenerHandler {
    fn handle_event(&self, _event: &Event, poll: &PollHandle) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        log::error!("failed to make {peer_addr} non-blocking: {e}");
                        continue;
                    }

                    let fd = stream.as_raw_fd();
                    let handler = ClientHandler {
                        fd,
                        connections: self.connections.clone(),
                    };
                    if let Err(e) =
                        poll.register(fd, Interest::READABLE | Interest::PEER_CLOSED, handler)
                    {
                        log::error!("failed to register {peer_addr}: {e}");
                        continue;
                    }

                    log::info!("new connection from {peer_addr} (fd {fd})");
                    self.connections.borrow_mut().insert(fd, stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::error!("accept failed: {e}");
                    break;
                }
            }
        }
    }
}

struct ClientHandler {
    fd: RawFd,
    connections: Connections,
}

impl ClientHandler {
    fn disconnect(&self, poll: &PollHandle) {
        let _ = poll.deregister(self.fd);
        // Dropping the stream closes the descriptor.
        self.connections.borrow_mut().remove(&self.fd);
        log::info!("connection closed (fd {})", self.fd);
    }
}

impl EventHandler for ClientHandler {
    fn handle_event(&self, event: &Event, poll: &PollHandle) {
        if event.is_peer_closed() || event.is_error() {
            self.disconnect(poll);
            return;
        }
        if !event.is_readable() {
            return;
        }

        let mut buf = [0u8; 8192];
        let echoed = {
            let mut connections = self.connections.borrow_mut();
            let Some(stream) = connections.get_mut(&self.fd) else {
                return;
            };
            match stream.read(&mut buf) {
                Ok(0) => Err(None),
                Ok(n) => stream.write_all(&buf[..n]).map_err(Some),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
                Err(e) => Err(Some(e)),
            }
        };

        if let Err(reason) = echoed {
            if let Some(e) = reason {
                log::error!("client fd {} failed: {e}", self.fd);
            }
            self.disconnect(poll);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let listener = TcpListener::bind("127.0.0.1:8080")?;
    listener.set_nonblocking(true)?;
    let listener_fd = listener.as_raw_fd();

    let event_loop = EventLoop::default();
    event_loop.register(
        listener_fd,
        Interest::READABLE,
        ListenerHandler {
            listener,
            connections: Rc::new(RefCell::new(HashMap::new())),
        },
    )?;

    log::info!("echo server listening on 127.0.0.1:8080");
    event_loop.run()
}
